//! Decoders and commands for core amp responses: zone power, volume, source
//! selection, mute, amp configuration and device identity.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::info;

use crate::error::Error;
use crate::params::{AvrParams, PARAM_MHL_SOURCE, PARAM_POWER_ON_VOLUME_BOUNCE};
use crate::properties::modes::media_control_mode_for_source;
use crate::properties::{AvrProperties, BaseProperty};
use crate::queue::CommandItem;
use crate::registry::CommandEntry;
use crate::types::Zone;

use super::code_map::{
    apply_meta, check_args, map_error, zfill, BoolMap, CodeMap, DictMap, IntMap, MapKind, MapMeta,
};
use super::response::Response;

// =============================================================================
// Zone power
// =============================================================================

/// Zone power status. Encoded as the inverse of the naive mapping (`0` is
/// on). Power transitions queue follow-up work: delayed basic queries, the
/// initial zone refresh and the optional main-zone volume bounce.
pub struct PowerMap;

impl PowerMap {
    const INNER: BoolMap = BoolMap::inverse(MapMeta::scalar("zone power", BaseProperty::Power));
}

fn power_on(mut response: Response, params: &AvrParams, properties: &mut AvrProperties) -> Vec<Response> {
    let Some(zone) = response.zone else {
        return vec![response];
    };
    let mut queue_commands = vec![CommandItem::new("_delayed_query_basic").arg(2.5).queue(3)];
    if !properties.zones_initial_refresh.contains(&zone) {
        info!("queueing initial refresh for {zone}");
        queue_commands.push(CommandItem::new("_delayed_refresh_zone").arg(zone.id()).queue(2));
    } else if properties.power.get(&zone) == Some(&true) {
        // zone is already on
        return Vec::new();
    }
    if zone == Zone::Z1 && params.get_bool(PARAM_POWER_ON_VOLUME_BOUNCE) {
        info!("queueing volume workaround for Main Zone");
        // volume bounce queues before any refresh
        queue_commands.push(CommandItem::new("volume_up").queue(0));
        queue_commands.push(CommandItem::new("volume_down").queue(0));
    }
    response.queue_commands = queue_commands;
    vec![response]
}

fn power_off(mut response: Response, _params: &AvrParams, properties: &mut AvrProperties) -> Vec<Response> {
    let Some(zone) = response.zone else {
        return vec![response];
    };
    if properties.power.get(&zone) == Some(&false) {
        // zone is already off
        return Vec::new();
    }
    response.queue_commands = vec![CommandItem::new("_delayed_query_basic").arg(4.5).queue(3)];
    vec![response]
}

impl CodeMap for PowerMap {
    fn meta(&self) -> &MapMeta {
        &Self::INNER.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Bool
    }

    fn code_len(&self) -> usize {
        1
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        Self::INNER.value_to_code(value)
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        Self::INNER.code_to_value(code)
    }

    fn decode_response(
        &self,
        mut response: Response,
        _params: &AvrParams,
        properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        apply_meta(self.meta(), &mut response);
        response.value = self.code_to_value(&response.code)?;
        if !properties.command_queue.is_starting() {
            response.callback =
                Some(if response.value == Value::Bool(true) { power_on } else { power_off });
        }
        response.update_zones = [Zone::All].into_iter().collect();
        Ok(vec![response])
    }
}

pub static POWER: PowerMap = PowerMap;

// =============================================================================
// Zone volume
// =============================================================================

/// Zone volume. 1 step = 0.5 dB for the Main Zone, 1.0 dB for other zones.
/// The upper bound is the per-zone max volume cached in the property store;
/// setting fails locally when it is not yet known.
pub struct VolumeMap;

impl VolumeMap {
    const META: MapMeta = MapMeta::scalar("volume", BaseProperty::Volume);
}

impl CodeMap for VolumeMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Int
    }

    fn code_len(&self) -> usize {
        3
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        code.trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| map_error(self.meta(), format!("invalid code {code}")))
    }

    fn parse_args(
        &self,
        command: &str,
        args: &[Value],
        zone: Zone,
        _params: &AvrParams,
        properties: &AvrProperties,
    ) -> Result<String, Error> {
        check_args(self, command, args)?;
        let value = args[0]
            .as_i64()
            .ok_or_else(|| map_error(self.meta(), format!("{} is not an integer", args[0])))?;
        let Some(max_volume) = properties.max_volume.get(&zone).copied() else {
            return Err(map_error(self.meta(), format!("volume for {zone} is not available")));
        };
        if value < 0 || value > max_volume {
            return Err(map_error(
                self.meta(),
                format!("{value} is outside of range 0 -- {max_volume}"),
            ));
        }
        Ok(zfill(value, if zone == Zone::Z1 { 3 } else { 2 }))
    }
}

pub static VOLUME: VolumeMap = VolumeMap;

// =============================================================================
// Zone source
// =============================================================================

/// Zone input source ID. Decoding also resolves the source name and media
/// control mode, and queues tuner queries when the tuner is selected.
pub struct SourceIdMap;

impl SourceIdMap {
    const META: MapMeta = MapMeta::scalar("source ID", BaseProperty::SourceId);
}

impl CodeMap for SourceIdMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Int
    }

    fn code_len(&self) -> usize {
        2
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        let id = value
            .as_i64()
            .ok_or_else(|| map_error(self.meta(), format!("{value} is not an integer")))?;
        if !(0..=99).contains(&id) {
            return Err(map_error(self.meta(), format!("{id} is outside of range 0 -- 99")));
        }
        Ok(zfill(id, 2))
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        code.parse::<i64>()
            .map(Value::from)
            .map_err(|_| map_error(self.meta(), format!("invalid code {code}")))
    }

    fn decode_response(
        &self,
        mut response: Response,
        params: &AvrParams,
        properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        apply_meta(self.meta(), &mut response);
        response.value = self.code_to_value(&response.code)?;
        let source = response.value.as_i64().unwrap_or(-1);

        let mut queue_commands = Vec::new();
        if properties.is_source_tuner(Some(source)) {
            queue_commands.push(CommandItem::new("query_tuner_frequency"));
            queue_commands.push(CommandItem::new("query_tuner_preset"));
        }
        queue_commands.push(CommandItem::new("_delayed_query_basic").arg(2.5).queue(3));

        let media_control_mode = media_control_mode_for_source(source)
            .map(str::to_string)
            .or_else(|| (params.get_i64(PARAM_MHL_SOURCE) == Some(source)).then(|| "MHL".to_string()));

        let name_response = response
            .derive()
            .with_property(BaseProperty::SourceName, None)
            .with_value(properties.get_source_name(source))
            .with_update_zones([Zone::All])
            .with_queue_commands(queue_commands);
        let mut control_response =
            response.derive().with_property(BaseProperty::MediaControlMode, None);
        control_response.value = media_control_mode.map(Value::String).unwrap_or(Value::Null);

        Ok(vec![name_response, response, control_response])
    }
}

pub static SOURCE_ID: SourceIdMap = SourceIdMap;

// =============================================================================
// Simple amp maps
// =============================================================================

pub static MUTE: BoolMap = BoolMap::inverse(MapMeta::scalar("mute", BaseProperty::Mute));

/// Wrapper that refuses to format a set command until the wrapped property
/// has been observed on this device.
pub struct Guarded<M> {
    inner: M,
}

impl<M> Guarded<M> {
    pub const fn new(inner: M) -> Self {
        Guarded { inner }
    }
}

impl<M: CodeMap> CodeMap for Guarded<M> {
    fn meta(&self) -> &MapMeta {
        self.inner.meta()
    }

    fn kind(&self) -> MapKind {
        self.inner.kind()
    }

    fn code_len(&self) -> usize {
        self.inner.code_len()
    }

    fn nargs(&self) -> usize {
        self.inner.nargs()
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        self.inner.value_to_code(value)
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        self.inner.code_to_value(code)
    }

    fn parse_args(
        &self,
        command: &str,
        args: &[Value],
        zone: Zone,
        params: &AvrParams,
        properties: &AvrProperties,
    ) -> Result<String, Error> {
        let meta = self.inner.meta();
        let known = meta
            .base_property
            .and_then(|base| properties.bag(base))
            .zip(meta.property_name)
            .and_then(|(bag, name)| bag.get(name))
            .map(|value| !value.is_null())
            .unwrap_or(false);
        if !known {
            return Err(Error::unavailable_command(
                command,
                format!("{} configuration not supported", meta.name),
            ));
        }
        self.inner.parse_args(command, args, zone, params, properties)
    }

    fn decode_response(
        &self,
        response: Response,
        params: &AvrParams,
        properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        self.inner.decode_response(response, params, properties)
    }
}

pub static SPEAKER_MODE: Guarded<DictMap> = Guarded::new(DictMap::new(
    MapMeta::keyed("speaker mode", BaseProperty::Amp, "speaker_mode"),
    &[("0", "off"), ("1", "A"), ("2", "B"), ("3", "A+B")],
));

pub static HDMI_OUT: Guarded<DictMap> = Guarded::new(DictMap::new(
    MapMeta::keyed("HDMI out", BaseProperty::Amp, "hdmi_out"),
    &[("0", "all"), ("1", "HDMI 1"), ("2", "HDMI 2")],
));

pub static HDMI3_OUT: Guarded<BoolMap> = Guarded::new(BoolMap::with_codes(
    MapMeta::keyed("HDMI3 out", BaseProperty::Amp, "hdmi3_out"),
    "1",
    "3",
));

pub static HDMI_AUDIO: Guarded<DictMap> = Guarded::new(DictMap::new(
    MapMeta::keyed("HDMI audio", BaseProperty::Amp, "hdmi_audio"),
    &[("0", "amp"), ("1", "passthrough")],
));

pub static PQLS: Guarded<DictMap> = Guarded::new(DictMap::new(
    MapMeta::keyed("PQLS", BaseProperty::Amp, "pqls"),
    &[("0", "off"), ("1", "auto")],
));

pub static DIMMER: DictMap = DictMap::new(
    MapMeta::keyed("dimmer", BaseProperty::Amp, "dimmer"),
    &[("0", "brightest"), ("1", "bright"), ("2", "dark"), ("3", "off")],
);

pub static SLEEP_TIME: IntMap =
    IntMap::new(MapMeta::keyed("sleep time", BaseProperty::Amp, "sleep_time"), 0, 90, 3).step(30);

pub static AMP_MODE: Guarded<DictMap> = Guarded::new(DictMap::new(
    MapMeta::keyed("AMP status", BaseProperty::Amp, "mode"),
    &[("0", "amp on"), ("1", "amp front off"), ("2", "amp front & center off"), ("3", "amp off")],
));

pub static PANEL_LOCK: DictMap = DictMap::new(
    MapMeta::keyed("panel lock", BaseProperty::Amp, "panel_lock"),
    &[("0", "off"), ("1", "panel only"), ("2", "panel + volume")],
);

pub static REMOTE_LOCK: BoolMap =
    BoolMap::new(MapMeta::keyed("remote lock", BaseProperty::Amp, "remote_lock"));

// =============================================================================
// Display and device identity
// =============================================================================

/// Front panel display text, sent as hex-encoded characters.
pub struct DisplayTextMap;

impl DisplayTextMap {
    const META: MapMeta = MapMeta::keyed("display text", BaseProperty::Amp, "display");
}

impl CodeMap for DisplayTextMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Str
    }

    fn code_len(&self) -> usize {
        0
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        let mut text = String::new();
        let mut index = 2;
        while index + 1 < code.len() {
            if let Ok(byte) = u8::from_str_radix(&code[index..index + 2], 16) {
                text.push(char::from(byte));
            }
            index += 2;
        }
        Ok(Value::String(text.replace('\t', " ").trim().to_string()))
    }
}

pub static DISPLAY_TEXT: DisplayTextMap = DisplayTextMap;

/// System MAC address, colon-separated on decode.
pub struct MacAddressMap;

impl MacAddressMap {
    const META: MapMeta = MapMeta::keyed("system MAC address", BaseProperty::Amp, "mac_addr");
}

impl CodeMap for MacAddressMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Str
    }

    fn code_len(&self) -> usize {
        12
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        let pairs: Vec<&str> = code
            .as_bytes()
            .chunks(2)
            .filter_map(|chunk| std::str::from_utf8(chunk).ok())
            .collect();
        Ok(Value::String(pairs.join(":")))
    }
}

pub static MAC_ADDRESS: MacAddressMap = MacAddressMap;

static MODEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>/]{5,})(/.[^>]*)?>").expect("model regex"));
static VERSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^)]*)""#).expect("version regex"));

/// System AVR model, extracted from the `RGD<model/...>` payload.
pub struct AvrModelMap;

impl AvrModelMap {
    const META: MapMeta = MapMeta::keyed("system AVR model", BaseProperty::Amp, "model");
}

impl CodeMap for AvrModelMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Str
    }

    fn code_len(&self) -> usize {
        0
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        let model = MODEL_REGEX
            .captures(code)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Value::String(model))
    }
}

pub static AVR_MODEL: AvrModelMap = AvrModelMap;

/// System software version, extracted from the quoted `SSI"..."` payload.
pub struct SoftwareVersionMap;

impl SoftwareVersionMap {
    const META: MapMeta =
        MapMeta::keyed("system software version", BaseProperty::Amp, "software_version");
}

impl CodeMap for SoftwareVersionMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Str
    }

    fn code_len(&self) -> usize {
        0
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        let version = VERSION_REGEX
            .captures(code)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Value::String(version))
    }
}

pub static SOFTWARE_VERSION: SoftwareVersionMap = SoftwareVersionMap;

/// Audio parameter prohibition/working flags: no property, but the device
/// state is about to change, so schedule a delayed basic query.
pub struct AudioParameterFlagMap {
    meta: MapMeta,
}

impl CodeMap for AudioParameterFlagMap {
    fn meta(&self) -> &MapMeta {
        &self.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Str
    }

    fn code_len(&self) -> usize {
        0
    }

    fn decode_response(
        &self,
        mut response: Response,
        _params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        response.queue_commands = vec![CommandItem::new("_delayed_query_basic").arg(2.5).queue(3)];
        Ok(vec![response])
    }
}

pub static AUDIO_PARAMETER_PROHIBITION: AudioParameterFlagMap =
    AudioParameterFlagMap { meta: MapMeta::new("audio parameter prohibition", None, None) };
pub static AUDIO_PARAMETER_WORKING: AudioParameterFlagMap =
    AudioParameterFlagMap { meta: MapMeta::new("audio parameter working", None, None) };

// =============================================================================
// Tables
// =============================================================================

pub static RESPONSES: &[(&str, &'static dyn CodeMap, Zone)] = &[
    ("PWR", &POWER, Zone::Z1),
    ("APR", &POWER, Zone::Z2),
    ("BPR", &POWER, Zone::Z3),
    ("ZEP", &POWER, Zone::Hdz),
    ("VOL", &VOLUME, Zone::Z1),
    ("ZV", &VOLUME, Zone::Z2),
    ("YV", &VOLUME, Zone::Z3),
    ("XV", &VOLUME, Zone::Hdz),
    ("FN", &SOURCE_ID, Zone::Z1),
    ("Z2F", &SOURCE_ID, Zone::Z2),
    ("Z3F", &SOURCE_ID, Zone::Z3),
    ("ZEA", &SOURCE_ID, Zone::Hdz),
    ("MUT", &MUTE, Zone::Z1),
    ("Z2MUT", &MUTE, Zone::Z2),
    ("Z3MUT", &MUTE, Zone::Z3),
    ("HZMUT", &MUTE, Zone::Hdz),
    ("SPK", &SPEAKER_MODE, Zone::All),
    ("HO", &HDMI_OUT, Zone::All),
    ("HDO", &HDMI3_OUT, Zone::All),
    ("HA", &HDMI_AUDIO, Zone::All),
    ("PQ", &PQLS, Zone::All),
    ("FL", &DISPLAY_TEXT, Zone::All),
    ("SAA", &DIMMER, Zone::All),
    ("SAB", &SLEEP_TIME, Zone::All),
    ("SAC", &AMP_MODE, Zone::All),
    ("PKL", &PANEL_LOCK, Zone::All),
    ("RML", &REMOTE_LOCK, Zone::All),
    ("SVB", &MAC_ADDRESS, Zone::All),
    ("RGD", &AVR_MODEL, Zone::All),
    ("SSI", &SOFTWARE_VERSION, Zone::All),
    ("AUA", &AUDIO_PARAMETER_PROHIBITION, Zone::Z1),
    ("AUB", &AUDIO_PARAMETER_WORKING, Zone::Z1),
];

pub static COMMANDS: &[CommandEntry] = &[
    CommandEntry::new(
        "turn_on",
        &[
            (Zone::Z1, "PO", Some("PWR")),
            (Zone::Z2, "APO", Some("APR")),
            (Zone::Z3, "BPO", Some("BPR")),
            (Zone::Hdz, "ZEO", Some("ZEP")),
        ],
    ),
    CommandEntry::new(
        "turn_off",
        &[
            (Zone::Z1, "PF", Some("PWR")),
            (Zone::Z2, "APF", Some("APR")),
            (Zone::Z3, "BPF", Some("BPR")),
            (Zone::Hdz, "ZEF", Some("ZEP")),
        ],
    ),
    CommandEntry::with_args(
        "select_source",
        &[
            (Zone::Z1, "FN", Some("FN")),
            (Zone::Z2, "ZS", Some("Z2F")),
            (Zone::Z3, "ZT", Some("Z3F")),
            (Zone::Hdz, "ZEA", Some("ZEA")),
        ],
        &SOURCE_ID,
    ),
    CommandEntry::new(
        "query_source_id",
        &[
            (Zone::Z1, "?F", Some("FN")),
            (Zone::Z2, "?ZS", Some("Z2F")),
            (Zone::Z3, "?ZT", Some("Z3F")),
            (Zone::Hdz, "?ZEA", Some("ZEA")),
        ],
    ),
    CommandEntry::new(
        "volume_up",
        &[
            (Zone::Z1, "VU", Some("VOL")),
            (Zone::Z2, "ZU", Some("ZV")),
            (Zone::Z3, "YU", Some("YV")),
            (Zone::Hdz, "HZU", Some("XV")),
        ],
    ),
    CommandEntry::new(
        "volume_down",
        &[
            (Zone::Z1, "VD", Some("VOL")),
            (Zone::Z2, "ZD", Some("ZV")),
            (Zone::Z3, "YD", Some("YV")),
            (Zone::Hdz, "HZD", Some("XV")),
        ],
    ),
    CommandEntry::with_args(
        "set_volume_level",
        &[
            (Zone::Z1, "VL", Some("VOL")),
            (Zone::Z2, "ZV", Some("ZV")),
            (Zone::Z3, "YV", Some("YV")),
            (Zone::Hdz, "HZV", Some("XV")),
        ],
        &VOLUME,
    ),
    CommandEntry::new(
        "query_volume",
        &[
            (Zone::Z1, "?V", Some("VOL")),
            (Zone::Z2, "?ZV", Some("ZV")),
            (Zone::Z3, "?YV", Some("YV")),
            (Zone::Hdz, "?HZV", Some("XV")),
        ],
    ),
    CommandEntry::new(
        "mute_on",
        &[
            (Zone::Z1, "MO", Some("MUT")),
            (Zone::Z2, "Z2MO", Some("Z2MUT")),
            (Zone::Z3, "Z3MO", Some("Z3MUT")),
            (Zone::Hdz, "HZMO", Some("HZMUT")),
        ],
    ),
    CommandEntry::new(
        "mute_off",
        &[
            (Zone::Z1, "MF", Some("MUT")),
            (Zone::Z2, "Z2MF", Some("Z2MUT")),
            (Zone::Z3, "Z3MF", Some("Z3MUT")),
            (Zone::Hdz, "HZMF", Some("HZMUT")),
        ],
    ),
    CommandEntry::new(
        "query_mute",
        &[
            (Zone::Z1, "?M", Some("MUT")),
            (Zone::Z2, "?Z2M", Some("Z2MUT")),
            (Zone::Z3, "?Z3M", Some("Z3MUT")),
            (Zone::Hdz, "?HZM", Some("HZMUT")),
        ],
    ),
    CommandEntry::new(
        "query_power",
        &[
            (Zone::Z1, "?P", Some("PWR")),
            (Zone::Z2, "?AP", Some("APR")),
            (Zone::Z3, "?BP", Some("BPR")),
            (Zone::Hdz, "?ZEP", Some("ZEP")),
        ],
    ),
    CommandEntry::new("query_amp_speaker_mode", &[(Zone::Z1, "?SPK", Some("SPK"))]),
    CommandEntry::with_args("set_amp_speaker_mode", &[(Zone::Z1, "SPK", Some("SPK"))], &SPEAKER_MODE),
    CommandEntry::new("query_amp_hdmi_out", &[(Zone::Z1, "?HO", Some("HO"))]),
    CommandEntry::with_args("set_amp_hdmi_out", &[(Zone::Z1, "HO", Some("HO"))], &HDMI_OUT),
    CommandEntry::new("query_amp_hdmi_audio", &[(Zone::Z1, "?HA", Some("HA"))]),
    CommandEntry::with_args("set_amp_hdmi_audio", &[(Zone::Z1, "HA", Some("HA"))], &HDMI_AUDIO),
    CommandEntry::new("query_amp_pqls", &[(Zone::Z1, "?PQ", Some("PQ"))]),
    CommandEntry::with_args("set_amp_pqls", &[(Zone::Z1, "PQ", Some("PQ"))], &PQLS),
    // no query command for the dimmer
    CommandEntry::with_args("set_amp_dimmer", &[(Zone::Z1, "SAA", Some("SAA"))], &DIMMER),
    CommandEntry::new("query_amp_sleep_time", &[(Zone::Z1, "?SAB", Some("SAB"))]),
    CommandEntry::with_args("set_amp_sleep_time", &[(Zone::Z1, "SAB", Some("SAB"))], &SLEEP_TIME),
    CommandEntry::new("query_amp_mode", &[(Zone::Z1, "?SAC", Some("SAC"))]),
    CommandEntry::with_args("set_amp_mode", &[(Zone::Z1, "SAC", Some("SAC"))], &AMP_MODE),
    CommandEntry::new("query_amp_panel_lock", &[(Zone::Z1, "?PKL", Some("PKL"))]),
    CommandEntry::with_args("set_amp_panel_lock", &[(Zone::Z1, "PKL", Some("PKL"))], &PANEL_LOCK),
    CommandEntry::new("query_amp_remote_lock", &[(Zone::Z1, "?RML", Some("RML"))]),
    CommandEntry::with_args("set_amp_remote_lock", &[(Zone::Z1, "RML", Some("RML"))], &REMOTE_LOCK),
    CommandEntry::new("query_display_information", &[(Zone::Z1, "?FL", Some("FL"))]),
    CommandEntry::new("system_query_mac_addr", &[(Zone::Z1, "?SVB", Some("SVB"))]),
    CommandEntry::new("system_query_model", &[(Zone::Z1, "?RGD", Some("RGD"))]),
    CommandEntry::new("system_query_software_version", &[(Zone::Z1, "?SSI", Some("SSI"))]),
    CommandEntry::new("operation_amp_status_display", &[(Zone::Z1, "STS", None)]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn power_encodes_inverted() {
        assert_eq!(POWER.value_to_code(&json!(true)).unwrap(), "0");
        assert_eq!(POWER.code_to_value("0").unwrap(), json!(true));
        assert_eq!(POWER.code_to_value("1").unwrap(), json!(false));
    }

    #[test]
    fn display_text_decodes_hex() {
        // first two characters carry display flags and are skipped
        let value = DISPLAY_TEXT.code_to_value("0048454c4c4f").unwrap();
        assert_eq!(value, json!("HELLO"));
    }

    #[test]
    fn model_extraction() {
        let value = AVR_MODEL.code_to_value("<VSX-930/B>").unwrap();
        assert_eq!(value, json!("VSX-930"));
        assert_eq!(AVR_MODEL.code_to_value("garbage").unwrap(), json!("unknown"));
    }

    #[test]
    fn software_version_extraction() {
        let value = SOFTWARE_VERSION.code_to_value("\"1.368\"").unwrap();
        assert_eq!(value, json!("1.368"));
    }

    #[test]
    fn mac_address_formatting() {
        let value = MAC_ADDRESS.code_to_value("00059A3C7A00").unwrap();
        assert_eq!(value, json!("00:05:9A:3C:7A:00"));
    }

    #[test]
    fn source_id_round_trip() {
        assert_eq!(SOURCE_ID.value_to_code(&json!(2)).unwrap(), "02");
        assert_eq!(SOURCE_ID.code_to_value("02").unwrap(), json!(2));
        assert!(SOURCE_ID.value_to_code(&json!(100)).is_err());
    }
}
