//! Decoders for audio responses: channel levels, listening mode and tone.

use serde_json::Value;

use crate::error::Error;
use crate::params::AvrParams;
use crate::properties::{AvrProperties, BaseProperty};
use crate::registry::CommandEntry;
use crate::types::Zone;

use super::code_map::{
    apply_meta, map_error, value_to_code_dynamic, CodeMap, DictMap, FloatMap, IntMap, MapKind,
    MapMeta,
};
use super::response::Response;

// =============================================================================
// Channel levels
// =============================================================================

/// Per-speaker channel level (1 step = 0.5 dB). The three-character speaker
/// label is embedded in the code and becomes the property sub-key.
pub struct ChannelLevelMap;

impl ChannelLevelMap {
    const LEVEL: FloatMap =
        FloatMap::new(MapMeta::scalar("channel level", BaseProperty::ChannelLevels), -12.0, 12.0, 2)
            .step(0.5)
            .divider(0.5)
            .offset(25.0);
}

impl CodeMap for ChannelLevelMap {
    fn meta(&self) -> &MapMeta {
        &Self::LEVEL.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Float
    }

    fn code_len(&self) -> usize {
        5
    }

    fn nargs(&self) -> usize {
        2
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        if code.len() < 4 {
            return Err(map_error(self.meta(), format!("invalid code {code}")));
        }
        Self::LEVEL.code_to_value(&code[3..])
    }

    fn parse_args(
        &self,
        command: &str,
        args: &[Value],
        _zone: Zone,
        _params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<String, Error> {
        super::code_map::check_args(self, command, args)?;
        let Some(channel) = args[0].as_str() else {
            return Err(map_error(self.meta(), format!("channel name expected, got {}", args[0])));
        };
        if channel.is_empty() || channel.len() > 3 {
            return Err(map_error(self.meta(), format!("invalid channel {channel}")));
        }
        let mut label = channel.to_uppercase();
        while label.len() < 3 {
            label.push('_');
        }
        Ok(format!("{label}{}", Self::LEVEL.value_to_code(&args[1])?))
    }

    fn decode_response(
        &self,
        mut response: Response,
        _params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        if response.code.len() < 4 {
            return Err(map_error(self.meta(), format!("invalid code {}", response.code)));
        }
        let speaker = response.code[..3].trim_matches('_').to_uppercase();
        response.value = Self::LEVEL.code_to_value(&response.code[3..])?;
        response.base_property = Some(BaseProperty::ChannelLevels);
        response.property_name = Some(speaker);
        Ok(vec![response])
    }
}

pub static CHANNEL_LEVEL: ChannelLevelMap = ChannelLevelMap;

// =============================================================================
// Listening mode
// =============================================================================

/// Listening mode, resolved through the dynamically-recomputed catalogue in
/// the property store. Decoding emits the display name plus the raw mode id.
pub struct ListeningModeMap;

impl ListeningModeMap {
    const META: MapMeta = MapMeta::scalar("listening mode", BaseProperty::ListeningMode);
}

impl CodeMap for ListeningModeMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::DynamicDict
    }

    fn code_len(&self) -> usize {
        4
    }

    fn parse_args(
        &self,
        command: &str,
        args: &[Value],
        _zone: Zone,
        _params: &AvrParams,
        properties: &AvrProperties,
    ) -> Result<String, Error> {
        super::code_map::check_args(self, command, args)?;
        value_to_code_dynamic(
            self.meta(),
            &args[0],
            properties
                .listening_modes_all
                .iter()
                .map(|(code, info)| (code.as_str(), info.name.as_str())),
        )
    }

    fn decode_response(
        &self,
        mut response: Response,
        _params: &AvrParams,
        properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        apply_meta(self.meta(), &mut response);
        let info = properties
            .listening_modes_all
            .get(&response.code)
            .ok_or_else(|| map_error(self.meta(), format!("key {} not found", response.code)))?;
        response.value = Value::String(info.name.clone());
        let mut raw = response.derive();
        raw.base_property = Some(BaseProperty::ListeningModeRaw);
        raw.property_name = None;
        raw.value = Value::String(response.code.clone());
        Ok(vec![response, raw])
    }
}

pub static LISTENING_MODE: ListeningModeMap = ListeningModeMap;

// =============================================================================
// Tone
// =============================================================================

pub static TONE_MODE: DictMap = DictMap::new(
    MapMeta::keyed("tone mode", BaseProperty::Tone, "status"),
    &[("0", "bypass"), ("1", "on")],
);

pub static TONE_BASS: IntMap =
    IntMap::new(MapMeta::keyed("tone bass", BaseProperty::Tone, "bass"), -6, 6, 2)
        .divider(-1)
        .offset(-6);

pub static TONE_TREBLE: IntMap =
    IntMap::new(MapMeta::keyed("tone treble", BaseProperty::Tone, "treble"), -6, 6, 2)
        .divider(-1)
        .offset(-6);

pub static RESPONSES: &[(&str, &'static dyn CodeMap, Zone)] = &[
    ("CLV", &CHANNEL_LEVEL, Zone::Z1),
    ("ZGE", &CHANNEL_LEVEL, Zone::Z2),
    ("ZHE", &CHANNEL_LEVEL, Zone::Z3),
    ("SR", &LISTENING_MODE, Zone::All),
    ("TO", &TONE_MODE, Zone::Z1),
    ("BA", &TONE_BASS, Zone::Z1),
    ("TR", &TONE_TREBLE, Zone::Z1),
    ("ZGA", &TONE_MODE, Zone::Z2),
    ("ZGB", &TONE_BASS, Zone::Z2),
    ("ZGC", &TONE_TREBLE, Zone::Z2),
];

pub static COMMANDS: &[CommandEntry] = &[
    CommandEntry::new("query_listening_mode", &[(Zone::Z1, "?S", Some("SR"))]),
    CommandEntry::with_args("set_listening_mode", &[(Zone::Z1, "SR", Some("SR"))], &LISTENING_MODE),
    CommandEntry::new(
        "query_tone_status",
        &[(Zone::Z1, "?TO", Some("TO")), (Zone::Z2, "?ZGA", Some("ZGA"))],
    ),
    CommandEntry::new(
        "query_tone_bass",
        &[(Zone::Z1, "?BA", Some("BA")), (Zone::Z2, "?ZGB", Some("ZGB"))],
    ),
    CommandEntry::new(
        "query_tone_treble",
        &[(Zone::Z1, "?TR", Some("TR")), (Zone::Z2, "?ZGC", Some("ZGC"))],
    ),
    CommandEntry::with_args(
        "set_tone_mode",
        &[(Zone::Z1, "TO", Some("TO")), (Zone::Z2, "ZGA", Some("ZGA"))],
        &TONE_MODE,
    ),
    CommandEntry::with_args(
        "set_tone_bass",
        &[(Zone::Z1, "BA", Some("BA")), (Zone::Z2, "ZGB", Some("ZGB"))],
        &TONE_BASS,
    ),
    CommandEntry::with_args(
        "set_tone_treble",
        &[(Zone::Z1, "TR", Some("TR")), (Zone::Z2, "ZGC", Some("ZGC"))],
        &TONE_TREBLE,
    ),
    CommandEntry::with_args(
        "set_channel_levels",
        &[
            (Zone::Z1, "CLV", Some("CLV")),
            (Zone::Z2, "ZGE", Some("ZGE")),
            (Zone::Z3, "ZHE", Some("ZHE")),
        ],
        &CHANNEL_LEVEL,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AvrParams;
    use serde_json::json;

    #[test]
    fn channel_level_extracts_speaker_label() {
        let params = AvrParams::default();
        let props = AvrProperties::new(params.clone());
        let response = Response::new("CLV", "L__52", Zone::Z1);
        let deltas = CHANNEL_LEVEL.decode_response(response, &params, &props).unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].property_name.as_deref(), Some("L"));
        assert_eq!(deltas[0].value, json!(1.0));
    }

    #[test]
    fn channel_level_args_pad_label() {
        let params = AvrParams::default();
        let props = AvrProperties::new(params.clone());
        let code = CHANNEL_LEVEL
            .parse_args("set_channel_levels", &[json!("sl"), json!(-1.5)], Zone::Z1, &params, &props)
            .unwrap();
        assert_eq!(code, "SL_47");
    }

    #[test]
    fn listening_mode_emits_name_and_raw_id() {
        let params = AvrParams::default();
        let props = AvrProperties::new(params.clone());
        let response = Response::new("SR", "0001", Zone::All);
        let deltas = LISTENING_MODE.decode_response(response, &params, &props).unwrap();
        assert_eq!(deltas[0].value, json!("STEREO"));
        assert_eq!(deltas[1].base_property, Some(BaseProperty::ListeningModeRaw));
        assert_eq!(deltas[1].value, json!("0001"));
    }

    #[test]
    fn tone_db_encoding_is_inverted() {
        assert_eq!(TONE_BASS.value_to_code(&json!(6)).unwrap(), "00");
        assert_eq!(TONE_BASS.value_to_code(&json!(0)).unwrap(), "06");
        assert_eq!(TONE_BASS.value_to_code(&json!(-6)).unwrap(), "12");
        assert_eq!(TONE_BASS.code_to_value("12").unwrap(), json!(-6));
    }
}
