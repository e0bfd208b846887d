//! Bidirectional code maps.
//!
//! Every wire property is described by a [`CodeMap`]: a stateless descriptor
//! converting between raw wire codes and typed values, decoding responses
//! into property deltas and formatting user arguments for set commands.
//! Family structs cover the common shapes; specialised maps in the decoder
//! modules implement the trait directly.

use serde_json::Value;

use crate::error::Error;
use crate::params::AvrParams;
use crate::properties::{AvrProperties, BaseProperty};
use crate::types::Zone;

use super::response::Response;

/// Decimal digits kept when rounding float values and step checks.
pub const CODE_MAP_NDIGITS: i32 = 3;

/// Map family, for introspective registry consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapKind {
    Bool,
    Dict,
    DynamicDict,
    Int,
    Float,
    Str,
    Compound,
}

/// Static metadata shared by all maps.
#[derive(Debug, Clone, Copy)]
pub struct MapMeta {
    /// Friendly name used in error messages.
    pub name: &'static str,
    pub base_property: Option<BaseProperty>,
    pub property_name: Option<&'static str>,
}

impl MapMeta {
    pub const fn new(
        name: &'static str,
        base_property: Option<BaseProperty>,
        property_name: Option<&'static str>,
    ) -> Self {
        MapMeta { name, base_property, property_name }
    }

    /// Metadata for a scalar property (no sub-key).
    pub const fn scalar(name: &'static str, base_property: BaseProperty) -> Self {
        MapMeta::new(name, Some(base_property), None)
    }

    /// Metadata for a keyed property under a base map.
    pub const fn keyed(
        name: &'static str,
        base_property: BaseProperty,
        property_name: &'static str,
    ) -> Self {
        MapMeta::new(name, Some(base_property), Some(property_name))
    }
}

pub(crate) fn map_error(map: &MapMeta, reason: impl Into<String>) -> Error {
    Error::LocalCommand { command: map.name.to_string(), reason: reason.into() }
}

/// A bidirectional code⇄value converter and response decoder.
pub trait CodeMap: Send + Sync {
    fn meta(&self) -> &MapMeta;
    fn kind(&self) -> MapKind;

    /// Fixed size of the code in the wire frame.
    fn code_len(&self) -> usize;

    /// Number of user arguments consumed by the set variant.
    fn nargs(&self) -> usize {
        1
    }

    fn value_to_code(&self, _value: &Value) -> Result<String, Error> {
        Err(map_error(self.meta(), "value_to_code unsupported"))
    }

    fn code_to_value(&self, _code: &str) -> Result<Value, Error> {
        Err(map_error(self.meta(), "code_to_value unsupported"))
    }

    /// Format user-supplied args into the wire payload for the set variant.
    /// Maps needing dynamic context (per-zone bounds, frequency step)
    /// override this and consult the property store.
    fn parse_args(
        &self,
        command: &str,
        args: &[Value],
        _zone: Zone,
        _params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<String, Error> {
        check_args(self, command, args)?;
        self.value_to_code(&args[0])
    }

    /// Decode a response into a list of deltas. The default implementation
    /// sets the property target from map metadata, converts the code and
    /// returns a single delta.
    fn decode_response(
        &self,
        mut response: Response,
        _params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        apply_meta(self.meta(), &mut response);
        response.value = self.code_to_value(&response.code)?;
        Ok(vec![response])
    }
}

/// Apply map metadata to a delta, without clobbering values already set.
pub fn apply_meta(meta: &MapMeta, response: &mut Response) {
    if meta.base_property.is_some() {
        response.base_property = meta.base_property;
    }
    if let Some(name) = meta.property_name {
        response.property_name = Some(name.to_string());
    }
}

/// Verify the exact argument count for a set command.
pub fn check_args(map: &(impl CodeMap + ?Sized), command: &str, args: &[Value]) -> Result<(), Error> {
    let nargs = map.nargs();
    if args.len() != nargs {
        let plural = if nargs == 1 { "" } else { "s" };
        return Err(Error::local(command, format!("{nargs} argument{plural} expected")));
    }
    Ok(())
}

// =============================================================================
// Boolean maps
// =============================================================================

/// Fixed single-character boolean codes, with `on`/`off` string aliases.
pub struct BoolMap {
    pub meta: MapMeta,
    pub code_true: &'static str,
    pub code_false: &'static str,
}

impl BoolMap {
    pub const fn new(meta: MapMeta) -> Self {
        BoolMap { meta, code_true: "1", code_false: "0" }
    }

    /// `0` means on: zone power and mute encode inverted.
    pub const fn inverse(meta: MapMeta) -> Self {
        BoolMap { meta, code_true: "0", code_false: "1" }
    }

    pub const fn with_codes(meta: MapMeta, code_true: &'static str, code_false: &'static str) -> Self {
        BoolMap { meta, code_true, code_false }
    }

    pub fn to_bool(&self, value: &Value) -> Result<bool, Error> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s == "on" => Ok(true),
            Value::String(s) if s == "off" => Ok(false),
            other => Err(map_error(&self.meta, format!("boolean value expected, got {other}"))),
        }
    }
}

impl CodeMap for BoolMap {
    fn meta(&self) -> &MapMeta {
        &self.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Bool
    }

    fn code_len(&self) -> usize {
        1
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        Ok(if self.to_bool(value)? { self.code_true } else { self.code_false }.to_string())
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        Ok(Value::Bool(code == self.code_true))
    }
}

// =============================================================================
// Dict maps
// =============================================================================

/// Static `code → value` mapping. An optional default makes unknown codes
/// decode to null instead of failing, acting as a catch-all.
pub struct DictMap {
    pub meta: MapMeta,
    pub entries: &'static [(&'static str, &'static str)],
    pub default_to_null: bool,
}

impl DictMap {
    pub const fn new(meta: MapMeta, entries: &'static [(&'static str, &'static str)]) -> Self {
        DictMap { meta, entries, default_to_null: false }
    }

    pub const fn with_default(
        meta: MapMeta,
        entries: &'static [(&'static str, &'static str)],
    ) -> Self {
        DictMap { meta, entries, default_to_null: true }
    }
}

impl CodeMap for DictMap {
    fn meta(&self) -> &MapMeta {
        &self.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Dict
    }

    fn code_len(&self) -> usize {
        self.entries.first().map(|(code, _)| code.len()).unwrap_or(0)
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        let Some(wanted) = value.as_str() else {
            return Err(map_error(&self.meta, format!("string value expected, got {value}")));
        };
        self.entries
            .iter()
            .find(|(_, name)| *name == wanted)
            .map(|(code, _)| code.to_string())
            .ok_or_else(|| map_error(&self.meta, format!("value {wanted} not found")))
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        if let Some((_, name)) = self.entries.iter().find(|(c, _)| *c == code) {
            return Ok(Value::String(name.to_string()));
        }
        if self.default_to_null {
            return Ok(Value::Null);
        }
        Err(map_error(&self.meta, format!("key {code} not found")))
    }
}

/// Convert a value through a runtime-supplied mapping, used by maps whose
/// table comes from parameters or the property store.
pub fn value_to_code_dynamic<'a, I>(
    meta: &MapMeta,
    value: &Value,
    entries: I,
) -> Result<String, Error>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let Some(wanted) = value.as_str() else {
        return Err(map_error(meta, format!("string value expected, got {value}")));
    };
    entries
        .into_iter()
        .find(|(_, name)| *name == wanted)
        .map(|(code, _)| code.to_string())
        .ok_or_else(|| map_error(meta, format!("value {wanted} not found")))
}

pub fn code_to_value_dynamic<'a, I>(meta: &MapMeta, code: &str, entries: I) -> Result<Value, Error>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    entries
        .into_iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| Value::String(name.to_string()))
        .ok_or_else(|| map_error(meta, format!("key {code} not found")))
}

// =============================================================================
// Numeric maps
// =============================================================================

/// Integer map with bounds, step, divider and offset.
///
/// `code = (value + offset) / divider`, zero-padded to `zfill`;
/// `value = code * divider - offset`.
pub struct IntMap {
    pub meta: MapMeta,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub step: i64,
    pub divider: i64,
    pub offset: i64,
    pub zfill: usize,
}

impl IntMap {
    pub const fn new(meta: MapMeta, min: i64, max: i64, zfill: usize) -> Self {
        IntMap { meta, min: Some(min), max: Some(max), step: 1, divider: 1, offset: 0, zfill }
    }

    pub const fn unbounded(meta: MapMeta, zfill: usize) -> Self {
        IntMap { meta, min: None, max: None, step: 1, divider: 1, offset: 0, zfill }
    }

    pub const fn step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    pub const fn divider(mut self, divider: i64) -> Self {
        self.divider = divider;
        self
    }

    pub const fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn to_int(&self, value: &Value) -> Result<i64, Error> {
        match value {
            Value::Number(n) if n.as_i64().is_some() => Ok(n.as_i64().unwrap_or_default()),
            Value::Number(n) if n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false) => {
                Ok(n.as_f64().unwrap_or_default() as i64)
            }
            other => Err(map_error(&self.meta, format!("{other} is not an integer"))),
        }
    }

    /// Convert with explicit bounds, for maps whose limits come from the
    /// property store (per-zone max volume, AM frequency step).
    pub fn to_code_bounded(
        &self,
        value: i64,
        min: Option<i64>,
        max: Option<i64>,
        step: i64,
    ) -> Result<String, Error> {
        check_int_bounds(&self.meta, value, min, max)?;
        if step != 1 && value % step != 0 {
            return Err(map_error(&self.meta, format!("{value} is not a multiple of {step}")));
        }
        let code = (value + self.offset) / self.divider;
        Ok(zfill(code, self.zfill))
    }
}

fn check_int_bounds(meta: &MapMeta, value: i64, min: Option<i64>, max: Option<i64>) -> Result<(), Error> {
    match (min, max) {
        (Some(min), Some(max)) if value < min || value > max => {
            Err(map_error(meta, format!("{value} is outside of range {min} -- {max}")))
        }
        (Some(min), None) if value < min => {
            Err(map_error(meta, format!("{value} is below minimum {min}")))
        }
        (None, Some(max)) if value > max => {
            Err(map_error(meta, format!("{value} is above maximum {max}")))
        }
        _ => Ok(()),
    }
}

pub(crate) fn zfill(value: i64, width: usize) -> String {
    if value < 0 {
        format!("-{:0>width$}", -value, width = width.saturating_sub(1))
    } else {
        format!("{value:0>width$}")
    }
}

impl CodeMap for IntMap {
    fn meta(&self) -> &MapMeta {
        &self.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Int
    }

    fn code_len(&self) -> usize {
        self.zfill
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        let value = self.to_int(value)?;
        self.to_code_bounded(value, self.min, self.max, self.step)
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        let code: i64 = code
            .trim()
            .parse()
            .map_err(|_| map_error(&self.meta, format!("invalid code {code}")))?;
        Ok(Value::from(code * self.divider - self.offset))
    }
}

/// Float map: as [`IntMap`] but without integrality enforcement; decoded
/// values round to [`CODE_MAP_NDIGITS`] decimal digits.
pub struct FloatMap {
    pub meta: MapMeta,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: f64,
    pub divider: f64,
    pub offset: f64,
    pub zfill: usize,
}

impl FloatMap {
    pub const fn new(meta: MapMeta, min: f64, max: f64, zfill: usize) -> Self {
        FloatMap { meta, min: Some(min), max: Some(max), step: 1.0, divider: 1.0, offset: 0.0, zfill }
    }

    pub const fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub const fn divider(mut self, divider: f64) -> Self {
        self.divider = divider;
        self
    }

    pub const fn offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn to_float(&self, value: &Value) -> Result<f64, Error> {
        value
            .as_f64()
            .ok_or_else(|| map_error(&self.meta, format!("{value} is not a number")))
    }

    pub fn to_code_checked(&self, value: f64) -> Result<String, Error> {
        if let Some(min) = self.min {
            if let Some(max) = self.max {
                if value < min || value > max {
                    return Err(map_error(
                        &self.meta,
                        format!("{value} is outside of range {min} -- {max}"),
                    ));
                }
            } else if value < min {
                return Err(map_error(&self.meta, format!("{value} is below minimum {min}")));
            }
        } else if let Some(max) = self.max {
            if value > max {
                return Err(map_error(&self.meta, format!("{value} is above maximum {max}")));
            }
        }
        let exp = 10f64.powi(CODE_MAP_NDIGITS);
        if self.step != 1.0 && ((value * exp).round() as i64) % ((self.step * exp).round() as i64) != 0 {
            return Err(map_error(&self.meta, format!("{value} is not a multiple of {}", self.step)));
        }
        let code = ((value + self.offset) / self.divider).round() as i64;
        Ok(zfill(code, self.zfill))
    }

    pub fn decode(&self, code: &str) -> Result<f64, Error> {
        let code: i64 = code
            .trim()
            .parse()
            .map_err(|_| map_error(&self.meta, format!("invalid code {code}")))?;
        let exp = 10f64.powi(CODE_MAP_NDIGITS);
        Ok(((code as f64 * self.divider - self.offset) * exp).round() / exp)
    }
}

impl CodeMap for FloatMap {
    fn meta(&self) -> &MapMeta {
        &self.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Float
    }

    fn code_len(&self) -> usize {
        self.zfill
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        self.to_code_checked(self.to_float(value)?)
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        Ok(Value::from(self.decode(code)?))
    }
}

// =============================================================================
// String maps
// =============================================================================

/// Fixed-length string with a fill character; decode right-strips the fill.
pub struct StrMap {
    pub meta: MapMeta,
    pub code_len: usize,
    pub fill: char,
}

impl StrMap {
    pub const fn new(meta: MapMeta, code_len: usize) -> Self {
        StrMap { meta, code_len, fill: '_' }
    }
}

impl CodeMap for StrMap {
    fn meta(&self) -> &MapMeta {
        &self.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Str
    }

    fn code_len(&self) -> usize {
        self.code_len
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        let Some(s) = value.as_str() else {
            return Err(map_error(&self.meta, format!("string value expected, got {value}")));
        };
        if self.code_len == 0 {
            return Ok(s.to_string());
        }
        if s.len() > self.code_len {
            return Err(map_error(&self.meta, format!("{s} is longer than {} characters", self.code_len)));
        }
        let mut code = s.to_string();
        while code.len() < self.code_len {
            code.push(self.fill);
        }
        Ok(code)
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        Ok(Value::String(code.trim_end_matches(self.fill).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEST_BOOL: BoolMap = BoolMap::new(MapMeta::scalar("test bool", BaseProperty::Power));
    const TEST_INVERSE: BoolMap = BoolMap::inverse(MapMeta::scalar("test power", BaseProperty::Power));
    const TEST_DICT: DictMap = DictMap::new(
        MapMeta::keyed("test dimmer", BaseProperty::Amp, "dimmer"),
        &[("0", "brightest"), ("1", "bright"), ("2", "dark"), ("3", "off")],
    );
    const TEST_INT: IntMap =
        IntMap::new(MapMeta::keyed("test sleep", BaseProperty::Amp, "sleep_time"), 0, 90, 3).step(30);
    const TEST_FLOAT: FloatMap =
        FloatMap::new(MapMeta::keyed("test level", BaseProperty::ChannelLevels, "L"), -12.0, 12.0, 2)
            .step(0.5)
            .divider(0.5)
            .offset(25.0);
    const TEST_STR: StrMap = StrMap::new(MapMeta::keyed("test preset", BaseProperty::Tuner, "preset"), 3);

    #[test]
    fn bool_round_trip_and_aliases() {
        assert_eq!(TEST_BOOL.value_to_code(&json!(true)).unwrap(), "1");
        assert_eq!(TEST_BOOL.value_to_code(&json!("off")).unwrap(), "0");
        assert_eq!(TEST_BOOL.code_to_value("1").unwrap(), json!(true));
        assert_eq!(TEST_INVERSE.value_to_code(&json!(true)).unwrap(), "0");
        assert_eq!(TEST_INVERSE.code_to_value("0").unwrap(), json!(true));
        assert!(TEST_BOOL.value_to_code(&json!(3)).is_err());
    }

    #[test]
    fn dict_round_trip() {
        for (code, name) in TEST_DICT.entries {
            assert_eq!(TEST_DICT.value_to_code(&json!(name)).unwrap(), *code);
            assert_eq!(TEST_DICT.code_to_value(code).unwrap(), json!(name));
        }
        assert!(TEST_DICT.code_to_value("9").is_err());
        let with_default = DictMap::with_default(TEST_DICT.meta, TEST_DICT.entries);
        assert_eq!(with_default.code_to_value("9").unwrap(), Value::Null);
    }

    #[test]
    fn int_bounds_and_step() {
        assert_eq!(TEST_INT.value_to_code(&json!(30)).unwrap(), "030");
        assert_eq!(TEST_INT.value_to_code(&json!(0)).unwrap(), "000");
        assert!(TEST_INT.value_to_code(&json!(91)).is_err());
        assert!(TEST_INT.value_to_code(&json!(-1)).is_err());
        assert!(TEST_INT.value_to_code(&json!(17)).is_err()); // not a multiple of 30
        assert_eq!(TEST_INT.code_to_value("090").unwrap(), json!(90));
    }

    #[test]
    fn int_round_trip_within_domain() {
        for value in (0..=90).step_by(30) {
            let code = TEST_INT.value_to_code(&json!(value)).unwrap();
            assert_eq!(TEST_INT.code_to_value(&code).unwrap(), json!(value));
        }
    }

    #[test]
    fn float_channel_level_round_trip() {
        // -12.0 .. 12.0 in 0.5 steps maps onto codes 26..74
        let mut value = -12.0;
        while value <= 12.0 {
            let code = TEST_FLOAT.value_to_code(&json!(value)).unwrap();
            assert_eq!(TEST_FLOAT.code_to_value(&code).unwrap(), json!(value));
            value += 0.5;
        }
        assert_eq!(TEST_FLOAT.value_to_code(&json!(0.0)).unwrap(), "50");
        assert!(TEST_FLOAT.value_to_code(&json!(0.3)).is_err());
        assert!(TEST_FLOAT.value_to_code(&json!(12.5)).is_err());
    }

    #[test]
    fn str_fill_round_trip() {
        assert_eq!(TEST_STR.value_to_code(&json!("A1")).unwrap(), "A1_");
        assert_eq!(TEST_STR.code_to_value("A1_").unwrap(), json!("A1"));
        assert!(TEST_STR.value_to_code(&json!("TOOLONG")).is_err());
    }

    #[test]
    fn zfill_pads_left() {
        assert_eq!(zfill(5, 3), "005");
        assert_eq!(zfill(185, 3), "185");
        assert_eq!(zfill(7, 0), "7");
    }
}
