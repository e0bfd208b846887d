//! Decoders for tuner responses: frequencies, the AM frequency step and
//! presets.

use serde_json::{json, Value};

use crate::error::Error;
use crate::params::AvrParams;
use crate::properties::{AvrProperties, BaseProperty};
use crate::queue::CommandItem;
use crate::registry::CommandEntry;
use crate::types::Zone;

use super::code_map::{
    apply_meta, check_args, map_error, CodeMap, FloatMap, MapKind, MapMeta, StrMap,
};
use super::response::Response;

/// Bounds for AM frequencies per frequency step.
pub fn am_frequency_bounds(step: i64) -> Option<(i64, i64)> {
    match step {
        9 => Some((531, 1701)),
        10 => Some((530, 1700)),
        _ => None,
    }
}

// =============================================================================
// FM frequency
// =============================================================================

/// Tuner FM frequency (1 step = 0.01 MHz).
pub struct FrequencyFmMap;

impl FrequencyFmMap {
    const INNER: FloatMap =
        FloatMap::new(MapMeta::keyed("FM frequency", BaseProperty::Tuner, "frequency"), 87.5, 108.0, 5)
            .step(0.05)
            .divider(0.01);
}

impl CodeMap for FrequencyFmMap {
    fn meta(&self) -> &MapMeta {
        &Self::INNER.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Float
    }

    fn code_len(&self) -> usize {
        5
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
        _properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        apply_meta(self.meta(), &mut response);
        response.value = self.code_to_value(&response.code)?;
        let mut band = response.derive();
        band.property_name = Some("band".to_string());
        band.value = json!("FM");
        Ok(vec![band, update_preset(&response), response])
    }
}

pub static FREQUENCY_FM: FrequencyFmMap = FrequencyFmMap;

// =============================================================================
// AM frequency
// =============================================================================

/// Tuner AM frequency (1 step = 1 kHz). Decoding gleans the AM frequency
/// step from the observed frequency when it is still unknown.
pub struct FrequencyAmMap;

impl FrequencyAmMap {
    const META: MapMeta = MapMeta::keyed("AM frequency", BaseProperty::Tuner, "frequency");
}

fn glean_frequency_step(
    response: Response,
    _params: &AvrParams,
    properties: &mut AvrProperties,
) -> Vec<Response> {
    if properties.tuner.get("am_frequency_step").and_then(Value::as_i64).is_some() {
        return Vec::new();
    }
    let Some(frequency) = response.value.as_i64() else {
        return Vec::new();
    };
    let div9 = frequency % 9 == 0;
    let div10 = frequency % 10 == 0;
    let step = match (div9, div10) {
        (true, false) => Some(9),
        (false, true) => Some(10),
        _ => None,
    };
    if let Some(step) = step {
        let mut update = response;
        update.base_property = Some(BaseProperty::Tuner);
        update.property_name = Some("am_frequency_step".to_string());
        update.value = json!(step);
        return vec![update];
    }
    // ambiguous: have the executor step the tuner and observe the deltas
    if !properties.is_source_tuner(None) {
        return Vec::new();
    }
    vec![response
        .clear_property()
        .with_queue_commands(vec![CommandItem::new("_calculate_am_frequency_step").queue(0)])]
}

impl CodeMap for FrequencyAmMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Int
    }

    fn code_len(&self) -> usize {
        5
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
        _zone: Zone,
        _params: &AvrParams,
        properties: &AvrProperties,
    ) -> Result<String, Error> {
        check_args(self, command, args)?;
        let Some(step) = properties.tuner.get("am_frequency_step").and_then(Value::as_i64) else {
            return Err(Error::local(command, crate::error::reason::FREQ_STEP_UNKNOWN));
        };
        let Some(frequency) = args[0].as_i64() else {
            return Err(map_error(self.meta(), format!("{} is not an integer", args[0])));
        };
        let Some((minimum, maximum)) = am_frequency_bounds(step) else {
            return Err(Error::local(command, crate::error::reason::FREQ_STEP_UNKNOWN));
        };
        if frequency < minimum || frequency > maximum {
            return Err(map_error(
                self.meta(),
                format!("{frequency} is outside of range {minimum} -- {maximum}"),
            ));
        }
        if (frequency - minimum) % step != 0 {
            return Err(map_error(self.meta(), format!("{frequency} is not a multiple of {step}")));
        }
        Ok(super::code_map::zfill(frequency, 5))
    }

    fn decode_response(
        &self,
        mut response: Response,
        _params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        apply_meta(self.meta(), &mut response);
        response.value = self.code_to_value(&response.code)?;
        let glean = response.derive().clear_property().with_callback(glean_frequency_step);
        let mut band = response.derive();
        band.property_name = Some("band".to_string());
        band.value = json!("AM");
        Ok(vec![glean, band, update_preset(&response), response])
    }
}

pub static FREQUENCY_AM: FrequencyAmMap = FrequencyAmMap;

// =============================================================================
// AM frequency step
// =============================================================================

/// AM frequency step, supported on very few AVRs.
pub struct AmFrequencyStepMap;

impl AmFrequencyStepMap {
    const META: MapMeta = MapMeta::keyed("AM frequency step", BaseProperty::Tuner, "am_frequency_step");
}

impl CodeMap for AmFrequencyStepMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Int
    }

    fn code_len(&self) -> usize {
        1
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        Ok(json!(if code == "0" { 9 } else { 10 }))
    }
}

pub static AM_FREQUENCY_STEP: AmFrequencyStepMap = AmFrequencyStepMap;

// =============================================================================
// Preset
// =============================================================================

fn cache_preset(
    response: Response,
    _params: &AvrParams,
    properties: &mut AvrProperties,
) -> Vec<Response> {
    properties.tuner.insert("cached_preset".to_string(), response.value.clone());
    vec![response]
}

fn check_cached_preset(
    response: Response,
    _params: &AvrParams,
    properties: &mut AvrProperties,
) -> Vec<Response> {
    let cached = properties.tuner.get("cached_preset").cloned().filter(|v| !v.is_null());
    if let Some(cached) = cached {
        properties.tuner.insert("cached_preset".to_string(), Value::Null);
        let mut class_delta = response.derive();
        class_delta.base_property = Some(BaseProperty::Tuner);
        class_delta.property_name = Some("class".to_string());
        class_delta.value = cached.get(0).cloned().unwrap_or(Value::Null);
        let mut preset_delta = response.derive();
        preset_delta.base_property = Some(BaseProperty::Tuner);
        preset_delta.property_name = Some("preset".to_string());
        preset_delta.value = cached.get(1).cloned().unwrap_or(Value::Null);
        return vec![class_delta, preset_delta];
    }
    // frequency changed without a preset recall: clear stale preset state
    if Some(&response.value) != properties.tuner.get("frequency") {
        let mut class_delta = response.derive();
        class_delta.base_property = Some(BaseProperty::Tuner);
        class_delta.property_name = Some("class".to_string());
        class_delta.value = Value::Null;
        let mut preset_delta = response.derive();
        preset_delta.base_property = Some(BaseProperty::Tuner);
        preset_delta.property_name = Some("preset".to_string());
        preset_delta.value = Value::Null;
        return vec![class_delta, preset_delta];
    }
    Vec::new()
}

/// Delta comparing a newly-decoded frequency against any cached preset.
fn update_preset(frequency_response: &Response) -> Response {
    frequency_response.derive().clear_property().with_callback(check_cached_preset)
}

/// Tuner preset, decoded as a class letter plus preset number. Decoded
/// presets are cached rather than applied; the next frequency update either
/// confirms them or clears them.
pub struct PresetMap;

impl PresetMap {
    const INNER: StrMap = StrMap::new(MapMeta::keyed("tuner preset", BaseProperty::Tuner, "preset"), 3);
}

impl CodeMap for PresetMap {
    fn meta(&self) -> &MapMeta {
        &Self::INNER.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Str
    }

    fn code_len(&self) -> usize {
        3
    }

    fn nargs(&self) -> usize {
        2
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        let class = value.get(0).and_then(Value::as_str).unwrap_or_default();
        let preset = value.get(1).and_then(Value::as_i64);
        if class.len() != 1 || !("A"..="G").contains(&class) {
            return Err(map_error(self.meta(), format!("class {class} outside of range A to G")));
        }
        let Some(preset) = preset.filter(|p| (0..=9).contains(p)) else {
            return Err(map_error(self.meta(), "preset outside of range 0 -- 9".to_string()));
        };
        Ok(format!("{class}{:02}", preset))
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        if code.len() < 2 {
            return Err(map_error(self.meta(), format!("invalid code {code}")));
        }
        let preset: i64 = code[1..]
            .parse()
            .map_err(|_| map_error(self.meta(), format!("invalid code {code}")))?;
        Ok(json!([&code[..1], preset]))
    }

    fn parse_args(
        &self,
        command: &str,
        args: &[Value],
        _zone: Zone,
        _params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<String, Error> {
        check_args(self, command, args)?;
        self.value_to_code(&json!([args[0], args[1]]))
    }

    fn decode_response(
        &self,
        mut response: Response,
        _params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        response.value = self.code_to_value(&response.code)?;
        response = response
            .clear_property()
            .with_queue_commands(vec![CommandItem::new("query_tuner_frequency")])
            .with_callback(cache_preset);
        Ok(vec![response])
    }
}

pub static PRESET: PresetMap = PresetMap;

pub static RESPONSES: &[(&str, &'static dyn CodeMap, Zone)] = &[
    ("FRF", &FREQUENCY_FM, Zone::All),
    ("FRA", &FREQUENCY_AM, Zone::All),
    ("SUQ", &AM_FREQUENCY_STEP, Zone::All),
    ("PR", &PRESET, Zone::All),
];

pub static COMMANDS: &[CommandEntry] = &[
    CommandEntry::new("query_tuner_frequency", &[(Zone::Z1, "?FR", Some("FR"))]),
    CommandEntry::new("query_tuner_preset", &[(Zone::Z1, "?PR", Some("PR"))]),
    CommandEntry::new("query_tuner_am_step", &[(Zone::Z1, "?SUQ", Some("SUQ"))]),
    CommandEntry::with_args("select_tuner_preset", &[(Zone::Z1, "PR", Some("PR"))], &PRESET),
    CommandEntry::new("increase_tuner_preset", &[(Zone::Z1, "TPI", Some("PR"))]),
    CommandEntry::new("decrease_tuner_preset", &[(Zone::Z1, "TPD", Some("PR"))]),
    CommandEntry::new("set_tuner_band_am", &[(Zone::Z1, "01TN", Some("FR"))]),
    CommandEntry::new("set_tuner_band_fm", &[(Zone::Z1, "00TN", Some("FR"))]),
    CommandEntry::new("increase_tuner_frequency", &[(Zone::Z1, "TFI", Some("FR"))]),
    CommandEntry::new("decrease_tuner_frequency", &[(Zone::Z1, "TFD", Some("FR"))]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fm_frequency_round_trip() {
        assert_eq!(FREQUENCY_FM.value_to_code(&json!(87.5)).unwrap(), "08750");
        assert_eq!(FREQUENCY_FM.code_to_value("08750").unwrap(), json!(87.5));
        assert_eq!(FREQUENCY_FM.code_to_value("10800").unwrap(), json!(108.0));
        assert!(FREQUENCY_FM.value_to_code(&json!(87.51)).is_err());
    }

    #[test]
    fn am_frequency_bounds_by_step() {
        assert_eq!(am_frequency_bounds(9), Some((531, 1701)));
        assert_eq!(am_frequency_bounds(10), Some((530, 1700)));
        assert_eq!(am_frequency_bounds(0), None);
    }

    #[test]
    fn preset_round_trip() {
        assert_eq!(PRESET.value_to_code(&json!(["A", 1])).unwrap(), "A01");
        assert_eq!(PRESET.code_to_value("A01").unwrap(), json!(["A", 1]));
        assert!(PRESET.value_to_code(&json!(["H", 1])).is_err());
        assert!(PRESET.value_to_code(&json!(["A", 10])).is_err());
    }

    #[test]
    fn am_step_decoding() {
        assert_eq!(AM_FREQUENCY_STEP.code_to_value("0").unwrap(), json!(9));
        assert_eq!(AM_FREQUENCY_STEP.code_to_value("1").unwrap(), json!(10));
    }
}
