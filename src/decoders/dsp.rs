//! Decoders for DSP functions. Most responses are only valid for Zone 1.

use serde_json::Value;

use crate::error::Error;
use crate::properties::BaseProperty;
use crate::registry::CommandEntry;
use crate::types::Zone;

use super::code_map::{
    map_error, BoolMap, CodeMap, DictMap, FloatMap, IntMap, MapKind, MapMeta,
};

pub static MCACC_MEMORY_SET: IntMap =
    IntMap::new(MapMeta::keyed("MCACC memory set", BaseProperty::Dsp, "mcacc_memory_set"), 1, 6, 1);

pub static PHASE_CONTROL: DictMap = DictMap::new(
    MapMeta::keyed("phase control", BaseProperty::Dsp, "phase_control"),
    &[("0", "off"), ("1", "on"), ("2", "full band on")],
);

/// Phase control plus (1 step = 1 ms); codes 97-99 read back as `auto`.
pub struct PhaseControlPlusMap;

impl PhaseControlPlusMap {
    const INNER: IntMap =
        IntMap::new(MapMeta::keyed("phase control plus", BaseProperty::Dsp, "phase_control_plus"), 0, 16, 2);
}

impl CodeMap for PhaseControlPlusMap {
    fn meta(&self) -> &MapMeta {
        &Self::INNER.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Int
    }

    fn code_len(&self) -> usize {
        2
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        if value.as_str() == Some("auto") {
            return Ok("97".to_string());
        }
        Self::INNER.value_to_code(value)
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        if matches!(code, "97" | "98" | "99") {
            return Ok(Value::String("auto".to_string()));
        }
        Self::INNER.code_to_value(code)
    }
}

pub static PHASE_CONTROL_PLUS: PhaseControlPlusMap = PhaseControlPlusMap;

pub static VIRTUAL_SPEAKERS: DictMap = DictMap::new(
    MapMeta::keyed("virtual speakers", BaseProperty::Dsp, "virtual_speakers"),
    &[("0", "auto"), ("1", "manual")],
);

pub static VIRTUAL_SOUNDBACK: BoolMap =
    BoolMap::new(MapMeta::keyed("virtual soundback", BaseProperty::Dsp, "virtual_sb"));

pub static VIRTUAL_HEIGHT: BoolMap =
    BoolMap::new(MapMeta::keyed("virtual height", BaseProperty::Dsp, "virtual_height"));

pub static VIRTUAL_WIDE: BoolMap =
    BoolMap::new(MapMeta::keyed("virtual wide", BaseProperty::Dsp, "virtual_wide"));

pub static VIRTUAL_DEPTH: DictMap = DictMap::new(
    MapMeta::keyed("virtual depth", BaseProperty::Dsp, "virtual_depth"),
    &[("0", "off"), ("1", "min"), ("2", "mid"), ("3", "max")],
);

pub static SOUND_RETRIEVER: BoolMap =
    BoolMap::new(MapMeta::keyed("sound retriever", BaseProperty::Dsp, "sound_retriever"));

pub static SIGNAL_SELECT: DictMap = DictMap::new(
    MapMeta::keyed("signal select", BaseProperty::Dsp, "signal_select"),
    &[("0", "auto"), ("1", "analog"), ("2", "digital"), ("3", "HDMI")],
);

pub static INPUT_ATTENUATOR: BoolMap =
    BoolMap::new(MapMeta::keyed("input attenuator", BaseProperty::Dsp, "input_attenuator"));

pub static EQUALIZER: BoolMap = BoolMap::new(MapMeta::keyed("equalizer", BaseProperty::Dsp, "eq"));

pub static STANDING_WAVE: BoolMap =
    BoolMap::new(MapMeta::keyed("standing wave", BaseProperty::Dsp, "standing_wave"));

/// Sound delay (1 step = 5 ms).
pub static SOUND_DELAY: IntMap =
    IntMap::new(MapMeta::keyed("sound delay", BaseProperty::Dsp, "sound_delay"), 0, 800, 3)
        .step(5)
        .divider(5);

pub static DIGITAL_NOISE_REDUCTION: BoolMap = BoolMap::new(MapMeta::keyed(
    "digital noise reduction",
    BaseProperty::Dsp,
    "digital_noise_reduction",
));

pub static DIALOG_ENHANCEMENT: DictMap = DictMap::new(
    MapMeta::keyed("dialog enhancement", BaseProperty::Dsp, "dialog_enhancement"),
    &[("0", "off"), ("1", "flat"), ("2", "+1"), ("3", "+2"), ("4", "+3"), ("5", "+4")],
);

pub static AUDIO_SCALER: DictMap = DictMap::new(
    MapMeta::keyed("audio scaler", BaseProperty::Dsp, "audio_scaler"),
    &[("0", "auto"), ("1", "manual")],
);

pub static HI_BIT: BoolMap = BoolMap::new(MapMeta::keyed("hi-bit", BaseProperty::Dsp, "hi_bit"));

pub static UP_SAMPLING: DictMap = DictMap::new(
    MapMeta::keyed("up sampling", BaseProperty::Dsp, "up_sampling"),
    &[("0", "off"), ("1", "2 times"), ("2", "4 times")],
);

pub static DIGITAL_FILTER: DictMap = DictMap::new(
    MapMeta::keyed("digital filter", BaseProperty::Dsp, "digital_filter"),
    &[("0", "slow"), ("1", "sharp"), ("2", "short")],
);

pub static DUAL_MONO: DictMap = DictMap::new(
    MapMeta::keyed("dual mono", BaseProperty::Dsp, "dual_mono"),
    &[("0", "CH1+CH2"), ("1", "CH1"), ("2", "CH2")],
);

pub static FIXED_PCM: BoolMap =
    BoolMap::new(MapMeta::keyed("fixed PCM", BaseProperty::Dsp, "fixed_pcm"));

pub static DYNAMIC_RANGE: DictMap = DictMap::new(
    MapMeta::keyed("dynamic range", BaseProperty::Dsp, "dynamic_range"),
    &[("0", "off"), ("1", "auto"), ("2", "mid"), ("3", "max")],
);

/// LFE attenuator in dB; code 50 reads back as `off`.
pub struct LfeAttenuatorMap;

impl LfeAttenuatorMap {
    const INNER: IntMap =
        IntMap::new(MapMeta::keyed("LFE attenuator", BaseProperty::Dsp, "lfe_attenuator"), -20, 0, 2)
            .divider(-1);
}

impl CodeMap for LfeAttenuatorMap {
    fn meta(&self) -> &MapMeta {
        &Self::INNER.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Int
    }

    fn code_len(&self) -> usize {
        2
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        if value.as_str() == Some("off") {
            return Ok("50".to_string());
        }
        Self::INNER.value_to_code(value)
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        if code == "50" {
            return Ok(Value::String("off".to_string()));
        }
        Self::INNER.code_to_value(code)
    }
}

pub static LFE_ATTENUATOR: LfeAttenuatorMap = LfeAttenuatorMap;

/// SACD gain, 0 or +6 dB.
pub struct SacdGainMap;

impl SacdGainMap {
    const META: MapMeta = MapMeta::keyed("SACD gain", BaseProperty::Dsp, "sacd_gain");
}

impl CodeMap for SacdGainMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Int
    }

    fn code_len(&self) -> usize {
        1
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        match value.as_i64() {
            Some(0) => Ok("0".to_string()),
            Some(6) => Ok("1".to_string()),
            _ => Err(map_error(self.meta(), format!("{value} not in [0, 6]"))),
        }
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        Ok(Value::from(if code == "1" { 6 } else { 0 }))
    }
}

pub static SACD_GAIN: SacdGainMap = SacdGainMap;

pub static AUTO_DELAY: BoolMap =
    BoolMap::new(MapMeta::keyed("auto delay", BaseProperty::Dsp, "auto_delay"));

pub static CENTER_WIDTH: IntMap =
    IntMap::new(MapMeta::keyed("center width", BaseProperty::Dsp, "center_width"), 0, 7, 1);

pub static PANORAMA: BoolMap =
    BoolMap::new(MapMeta::keyed("panorama", BaseProperty::Dsp, "panorama"));

pub static DIMENSION: IntMap =
    IntMap::new(MapMeta::keyed("dimension", BaseProperty::Dsp, "dimension"), -3, 3, 2).offset(50);

/// Center image (1 step = 0.1).
pub static CENTER_IMAGE: FloatMap =
    FloatMap::new(MapMeta::keyed("center image", BaseProperty::Dsp, "center_image"), 0.0, 1.0, 2)
        .step(0.1)
        .divider(0.1);

/// Effect (1 step = 10).
pub static EFFECT: IntMap =
    IntMap::new(MapMeta::keyed("effect", BaseProperty::Dsp, "effect"), 10, 90, 2).step(10).divider(10);

pub static HEIGHT_GAIN: DictMap = DictMap::new(
    MapMeta::keyed("height gain", BaseProperty::Dsp, "height_gain"),
    &[("0", "low"), ("1", "mid"), ("2", "high")],
);

pub static LOUDNESS_MANAGEMENT: BoolMap =
    BoolMap::new(MapMeta::keyed("loudness management", BaseProperty::Dsp, "loudness_management"));

pub static CENTER_SPREAD: BoolMap =
    BoolMap::new(MapMeta::keyed("center spread", BaseProperty::Dsp, "center_spread"));

pub static RENDERING_MODE: DictMap = DictMap::new(
    MapMeta::keyed("rendering mode", BaseProperty::Dsp, "rendering_mode"),
    &[("0", "object base"), ("1", "channel base")],
);

pub static RESPONSES: &[(&str, &'static dyn CodeMap, Zone)] = &[
    ("MC", &MCACC_MEMORY_SET, Zone::All),
    ("IS", &PHASE_CONTROL, Zone::All),
    ("ATE", &PHASE_CONTROL_PLUS, Zone::All),
    ("VSP", &VIRTUAL_SPEAKERS, Zone::All),
    ("VSB", &VIRTUAL_SOUNDBACK, Zone::All),
    ("VHT", &VIRTUAL_HEIGHT, Zone::All),
    ("VWD", &VIRTUAL_WIDE, Zone::All),
    ("VDP", &VIRTUAL_DEPTH, Zone::All),
    ("ATA", &SOUND_RETRIEVER, Zone::All),
    ("SDA", &SIGNAL_SELECT, Zone::All),
    ("SDB", &INPUT_ATTENUATOR, Zone::All),
    ("ATC", &EQUALIZER, Zone::All),
    ("ATD", &STANDING_WAVE, Zone::All),
    ("ATF", &SOUND_DELAY, Zone::All),
    ("ATG", &DIGITAL_NOISE_REDUCTION, Zone::All),
    ("ATH", &DIALOG_ENHANCEMENT, Zone::All),
    ("ATY", &AUDIO_SCALER, Zone::All),
    ("ATI", &HI_BIT, Zone::All),
    ("ATZ", &UP_SAMPLING, Zone::All),
    ("ATV", &DIGITAL_FILTER, Zone::All),
    ("ATJ", &DUAL_MONO, Zone::All),
    ("ATK", &FIXED_PCM, Zone::All),
    ("ATL", &DYNAMIC_RANGE, Zone::All),
    ("ATM", &LFE_ATTENUATOR, Zone::All),
    ("ATN", &SACD_GAIN, Zone::All),
    ("ATO", &AUTO_DELAY, Zone::All),
    ("ATP", &CENTER_WIDTH, Zone::All),
    ("ATQ", &PANORAMA, Zone::All),
    ("ATR", &DIMENSION, Zone::All),
    ("ATS", &CENTER_IMAGE, Zone::All),
    ("ATT", &EFFECT, Zone::All),
    ("ATU", &HEIGHT_GAIN, Zone::All),
    ("ATW", &LOUDNESS_MANAGEMENT, Zone::All),
    ("ARA", &CENTER_SPREAD, Zone::All),
    ("ARB", &RENDERING_MODE, Zone::All),
];

pub static COMMANDS: &[CommandEntry] = &[
    CommandEntry::new("query_dsp_mcacc_memory_set", &[(Zone::Z1, "?MC", Some("MC"))]),
    CommandEntry::with_args("set_dsp_mcacc_memory_set", &[(Zone::Z1, "MC", Some("MC"))], &MCACC_MEMORY_SET),
    CommandEntry::new("query_dsp_phase_control", &[(Zone::Z1, "?IS", Some("IS"))]),
    CommandEntry::with_args("set_dsp_phase_control", &[(Zone::Z1, "IS", Some("IS"))], &PHASE_CONTROL),
    CommandEntry::new("query_dsp_phase_control_plus", &[(Zone::Z1, "?ATE", Some("ATE"))]),
    CommandEntry::with_args(
        "set_dsp_phase_control_plus",
        &[(Zone::Z1, "ATE", Some("ATE"))],
        &PHASE_CONTROL_PLUS,
    ),
    CommandEntry::new("query_dsp_virtual_speakers", &[(Zone::Z1, "?VSP", Some("VSP"))]),
    CommandEntry::with_args("set_dsp_virtual_speakers", &[(Zone::Z1, "VSP", Some("VSP"))], &VIRTUAL_SPEAKERS),
    CommandEntry::new("query_dsp_virtual_sb", &[(Zone::Z1, "?VSB", Some("VSB"))]),
    CommandEntry::with_args("set_dsp_virtual_sb", &[(Zone::Z1, "VSB", Some("VSB"))], &VIRTUAL_SOUNDBACK),
    CommandEntry::new("query_dsp_virtual_height", &[(Zone::Z1, "?VHT", Some("VHT"))]),
    CommandEntry::with_args("set_dsp_virtual_height", &[(Zone::Z1, "VHT", Some("VHT"))], &VIRTUAL_HEIGHT),
    CommandEntry::new("query_dsp_virtual_wide", &[(Zone::Z1, "?VWD", Some("VWD"))]),
    CommandEntry::with_args("set_dsp_virtual_wide", &[(Zone::Z1, "VWD", Some("VWD"))], &VIRTUAL_WIDE),
    CommandEntry::new("query_dsp_virtual_depth", &[(Zone::Z1, "?VDP", Some("VDP"))]),
    CommandEntry::with_args("set_dsp_virtual_depth", &[(Zone::Z1, "VDP", Some("VDP"))], &VIRTUAL_DEPTH),
    CommandEntry::new("query_dsp_sound_retriever", &[(Zone::Z1, "?ATA", Some("ATA"))]),
    CommandEntry::with_args("set_dsp_sound_retriever", &[(Zone::Z1, "ATA", Some("ATA"))], &SOUND_RETRIEVER),
    CommandEntry::new("query_dsp_signal_select", &[(Zone::Z1, "?SDA", Some("SDA"))]),
    CommandEntry::with_args("set_dsp_signal_select", &[(Zone::Z1, "SDA", Some("SDA"))], &SIGNAL_SELECT),
    CommandEntry::new("query_dsp_input_attenuator", &[(Zone::Z1, "?SDB", Some("SDB"))]),
    CommandEntry::with_args("set_dsp_input_attenuator", &[(Zone::Z1, "SDB", Some("SDB"))], &INPUT_ATTENUATOR),
    CommandEntry::new("query_dsp_eq", &[(Zone::Z1, "?ATC", Some("ATC"))]),
    CommandEntry::with_args("set_dsp_eq", &[(Zone::Z1, "ATC", Some("ATC"))], &EQUALIZER),
    CommandEntry::new("query_dsp_standing_wave", &[(Zone::Z1, "?ATD", Some("ATD"))]),
    CommandEntry::with_args("set_dsp_standing_wave", &[(Zone::Z1, "ATD", Some("ATD"))], &STANDING_WAVE),
    CommandEntry::new("query_dsp_sound_delay", &[(Zone::Z1, "?ATF", Some("ATF"))]),
    CommandEntry::with_args("set_dsp_sound_delay", &[(Zone::Z1, "ATF", Some("ATF"))], &SOUND_DELAY),
    CommandEntry::new("query_dsp_digital_noise_reduction", &[(Zone::Z1, "?ATG", Some("ATG"))]),
    CommandEntry::with_args(
        "set_dsp_digital_noise_reduction",
        &[(Zone::Z1, "ATG", Some("ATG"))],
        &DIGITAL_NOISE_REDUCTION,
    ),
    CommandEntry::new("query_dsp_dialog_enhancement", &[(Zone::Z1, "?ATH", Some("ATH"))]),
    CommandEntry::with_args(
        "set_dsp_dialog_enhancement",
        &[(Zone::Z1, "ATH", Some("ATH"))],
        &DIALOG_ENHANCEMENT,
    ),
    CommandEntry::new("query_dsp_audio_scaler", &[(Zone::Z1, "?ATY", Some("ATY"))]),
    CommandEntry::with_args("set_dsp_audio_scaler", &[(Zone::Z1, "ATY", Some("ATY"))], &AUDIO_SCALER),
    CommandEntry::new("query_dsp_hi_bit", &[(Zone::Z1, "?ATI", Some("ATI"))]),
    CommandEntry::with_args("set_dsp_hi_bit", &[(Zone::Z1, "ATI", Some("ATI"))], &HI_BIT),
    CommandEntry::new("query_dsp_up_sampling", &[(Zone::Z1, "?ATZ", Some("ATZ"))]),
    CommandEntry::with_args("set_dsp_up_sampling", &[(Zone::Z1, "ATZ", Some("ATZ"))], &UP_SAMPLING),
    CommandEntry::new("query_dsp_digital_filter", &[(Zone::Z1, "?ATV", Some("ATV"))]),
    CommandEntry::with_args("set_dsp_digital_filter", &[(Zone::Z1, "ATV", Some("ATV"))], &DIGITAL_FILTER),
    CommandEntry::new("query_dsp_dual_mono", &[(Zone::Z1, "?ATJ", Some("ATJ"))]),
    CommandEntry::with_args("set_dsp_dual_mono", &[(Zone::Z1, "ATJ", Some("ATJ"))], &DUAL_MONO),
    CommandEntry::new("query_dsp_fixed_pcm", &[(Zone::Z1, "?ATK", Some("ATK"))]),
    CommandEntry::with_args("set_dsp_fixed_pcm", &[(Zone::Z1, "ATK", Some("ATK"))], &FIXED_PCM),
    CommandEntry::new("query_dsp_dynamic_range", &[(Zone::Z1, "?ATL", Some("ATL"))]),
    CommandEntry::with_args("set_dsp_dynamic_range", &[(Zone::Z1, "ATL", Some("ATL"))], &DYNAMIC_RANGE),
    CommandEntry::new("query_dsp_lfe_attenuator", &[(Zone::Z1, "?ATM", Some("ATM"))]),
    CommandEntry::with_args("set_dsp_lfe_attenuator", &[(Zone::Z1, "ATM", Some("ATM"))], &LFE_ATTENUATOR),
    CommandEntry::new("query_dsp_sacd_gain", &[(Zone::Z1, "?ATN", Some("ATN"))]),
    CommandEntry::with_args("set_dsp_sacd_gain", &[(Zone::Z1, "ATN", Some("ATN"))], &SACD_GAIN),
    CommandEntry::new("query_dsp_auto_delay", &[(Zone::Z1, "?ATO", Some("ATO"))]),
    CommandEntry::with_args("set_dsp_auto_delay", &[(Zone::Z1, "ATO", Some("ATO"))], &AUTO_DELAY),
    CommandEntry::new("query_dsp_center_width", &[(Zone::Z1, "?ATP", Some("ATP"))]),
    CommandEntry::with_args("set_dsp_center_width", &[(Zone::Z1, "ATP", Some("ATP"))], &CENTER_WIDTH),
    CommandEntry::new("query_dsp_panorama", &[(Zone::Z1, "?ATQ", Some("ATQ"))]),
    CommandEntry::with_args("set_dsp_panorama", &[(Zone::Z1, "ATQ", Some("ATQ"))], &PANORAMA),
    CommandEntry::new("query_dsp_dimension", &[(Zone::Z1, "?ATR", Some("ATR"))]),
    CommandEntry::with_args("set_dsp_dimension", &[(Zone::Z1, "ATR", Some("ATR"))], &DIMENSION),
    CommandEntry::new("query_dsp_center_image", &[(Zone::Z1, "?ATS", Some("ATS"))]),
    CommandEntry::with_args("set_dsp_center_image", &[(Zone::Z1, "ATS", Some("ATS"))], &CENTER_IMAGE),
    CommandEntry::new("query_dsp_effect", &[(Zone::Z1, "?ATT", Some("ATT"))]),
    CommandEntry::with_args("set_dsp_effect", &[(Zone::Z1, "ATT", Some("ATT"))], &EFFECT),
    CommandEntry::new("query_dsp_height_gain", &[(Zone::Z1, "?ATU", Some("ATU"))]),
    CommandEntry::with_args("set_dsp_height_gain", &[(Zone::Z1, "ATU", Some("ATU"))], &HEIGHT_GAIN),
    CommandEntry::new("query_dsp_loudness_management", &[(Zone::Z1, "?ATW", Some("ATW"))]),
    CommandEntry::with_args(
        "set_dsp_loudness_management",
        &[(Zone::Z1, "ATW", Some("ATW"))],
        &LOUDNESS_MANAGEMENT,
    ),
    CommandEntry::new("query_dsp_center_spread", &[(Zone::Z1, "?ARA", Some("ARA"))]),
    CommandEntry::with_args("set_dsp_center_spread", &[(Zone::Z1, "ARA", Some("ARA"))], &CENTER_SPREAD),
    CommandEntry::new("query_dsp_rendering_mode", &[(Zone::Z1, "?ARB", Some("ARB"))]),
    CommandEntry::with_args("set_dsp_rendering_mode", &[(Zone::Z1, "ARB", Some("ARB"))], &RENDERING_MODE),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn phase_control_plus_auto_codes() {
        assert_eq!(PHASE_CONTROL_PLUS.value_to_code(&json!("auto")).unwrap(), "97");
        assert_eq!(PHASE_CONTROL_PLUS.value_to_code(&json!(9)).unwrap(), "09");
        assert_eq!(PHASE_CONTROL_PLUS.code_to_value("98").unwrap(), json!("auto"));
        assert_eq!(PHASE_CONTROL_PLUS.code_to_value("09").unwrap(), json!(9));
    }

    #[test]
    fn lfe_attenuator_off_sentinel() {
        assert_eq!(LFE_ATTENUATOR.value_to_code(&json!("off")).unwrap(), "50");
        assert_eq!(LFE_ATTENUATOR.value_to_code(&json!(-15)).unwrap(), "15");
        assert_eq!(LFE_ATTENUATOR.code_to_value("50").unwrap(), json!("off"));
        assert_eq!(LFE_ATTENUATOR.code_to_value("15").unwrap(), json!(-15));
    }

    #[test]
    fn sacd_gain_only_two_values() {
        assert_eq!(SACD_GAIN.value_to_code(&json!(6)).unwrap(), "1");
        assert!(SACD_GAIN.value_to_code(&json!(3)).is_err());
        assert_eq!(SACD_GAIN.code_to_value("0").unwrap(), json!(0));
    }

    #[test]
    fn dimension_uses_code_offset() {
        assert_eq!(DIMENSION.value_to_code(&json!(-3)).unwrap(), "47");
        assert_eq!(DIMENSION.value_to_code(&json!(3)).unwrap(), "53");
        assert_eq!(DIMENSION.code_to_value("50").unwrap(), json!(0));
    }

    #[test]
    fn sound_delay_step() {
        assert_eq!(SOUND_DELAY.value_to_code(&json!(800)).unwrap(), "160");
        assert!(SOUND_DELAY.value_to_code(&json!(802)).is_err());
        assert_eq!(SOUND_DELAY.code_to_value("160").unwrap(), json!(800));
    }
}
