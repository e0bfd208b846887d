//! Decoders for system responses: source names and the speaker system.

use serde_json::{json, Value};

use crate::error::Error;
use crate::params::{AvrParams, PARAM_SPEAKER_SYSTEM_MODES};
use crate::properties::{AvrProperties, BaseProperty};
use crate::registry::CommandEntry;
use crate::types::Zone;

use super::code_map::{
    apply_meta, check_args, code_to_value_dynamic, map_error, value_to_code_dynamic, CodeMap,
    MapKind, MapMeta,
};
use super::response::Response;

// =============================================================================
// Source names
// =============================================================================

/// Source name mapping, decoded from `RGB` frames as `(id, name)` pairs.
///
/// A pre-commit callback removes any prior bindings for the same id or name
/// before two deltas rewrite both directions of the bijection. Decoding is a
/// no-op unless source queries are enabled.
pub struct SourceNameMap;

impl SourceNameMap {
    const META: MapMeta = MapMeta::scalar("source name", BaseProperty::SourceName);
}

fn clear_source_bindings(
    response: Response,
    _params: &AvrParams,
    properties: &mut AvrProperties,
) -> Vec<Response> {
    let (Some(id), Some(name)) = (
        response.value.get(0).and_then(Value::as_i64),
        response.value.get(1).and_then(Value::as_str),
    ) else {
        return Vec::new();
    };
    if let Some(old_name) = properties.source_id_to_name.remove(&id) {
        properties.source_name_to_id.remove(&old_name);
    }
    if let Some(old_id) = properties.source_name_to_id.remove(name) {
        properties.source_id_to_name.remove(&old_id);
    }
    Vec::new()
}

impl CodeMap for SourceNameMap {
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
        if code.len() < 3 {
            return Err(map_error(self.meta(), format!("invalid code {code}")));
        }
        let id: i64 = code[..2]
            .parse()
            .map_err(|_| map_error(self.meta(), format!("invalid source id in {code}")))?;
        Ok(json!([id, &code[3..]]))
    }

    fn decode_response(
        &self,
        response: Response,
        _params: &AvrParams,
        properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        if properties.query_sources != Some(true) {
            // only update source mappings while the AVR is being queried
            return Ok(Vec::new());
        }
        let pair = self.code_to_value(&response.code)?;
        let id = pair.get(0).and_then(Value::as_i64).unwrap_or_default();
        let name = pair.get(1).and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(vec![
            response.derive().with_value(pair).with_callback(clear_source_bindings),
            response
                .derive()
                .with_property(BaseProperty::SourceNameToId, Some(&name))
                .with_value(id),
            response
                .derive()
                .with_property(BaseProperty::SourceIdToName, Some(&id.to_string()))
                .with_value(name),
        ])
    }
}

pub static SOURCE_NAME: SourceNameMap = SourceNameMap;

// =============================================================================
// Speaker system
// =============================================================================

/// Speaker system configuration. The code table is model-specific and comes
/// from the `amp_speaker_system_modes` parameter; the raw code is kept in a
/// second delta.
pub struct SpeakerSystemMap;

impl SpeakerSystemMap {
    const META: MapMeta = MapMeta::keyed("speaker system", BaseProperty::System, "speaker_system");

    fn mode_entries(params: &AvrParams) -> Vec<(String, String)> {
        params
            .get_map(PARAM_SPEAKER_SYSTEM_MODES)
            .into_iter()
            .filter_map(|(code, name)| name.as_str().map(|n| (code, n.to_string())))
            .collect()
    }
}

impl CodeMap for SpeakerSystemMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::DynamicDict
    }

    fn code_len(&self) -> usize {
        2
    }

    fn parse_args(
        &self,
        command: &str,
        args: &[Value],
        _zone: Zone,
        params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<String, Error> {
        check_args(self, command, args)?;
        let entries = Self::mode_entries(params);
        value_to_code_dynamic(
            self.meta(),
            &args[0],
            entries.iter().map(|(c, n)| (c.as_str(), n.as_str())),
        )
    }

    fn decode_response(
        &self,
        mut response: Response,
        params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        apply_meta(self.meta(), &mut response);
        let entries = Self::mode_entries(params);
        response.value = code_to_value_dynamic(
            self.meta(),
            &response.code,
            entries.iter().map(|(c, n)| (c.as_str(), n.as_str())),
        )?;
        let mut raw = response.derive();
        raw.property_name = Some("speaker_system_raw".to_string());
        raw.value = Value::String(response.code.clone());
        Ok(vec![response, raw])
    }
}

pub static SPEAKER_SYSTEM: SpeakerSystemMap = SpeakerSystemMap;

pub static RESPONSES: &[(&str, &'static dyn CodeMap, Zone)] = &[
    ("RGB", &SOURCE_NAME, Zone::All),
    ("SSF", &SPEAKER_SYSTEM, Zone::All),
];

pub static COMMANDS: &[CommandEntry] = &[
    CommandEntry::new("query_source_name", &[(Zone::Z1, "?RGB", Some("RGB"))]),
    CommandEntry::new("query_system_speaker_system", &[(Zone::Z1, "?SSF", Some("SSF"))]),
    CommandEntry::with_args(
        "set_system_speaker_system",
        &[(Zone::Z1, "SSF", Some("SSF"))],
        &SPEAKER_SYSTEM,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AvrParams;

    #[test]
    fn source_name_pairs() {
        let value = SOURCE_NAME.code_to_value("261NETRADIO").unwrap();
        assert_eq!(value, json!([26, "NETRADIO"]));
    }

    #[test]
    fn speaker_system_uses_parameter_table() {
        let params = AvrParams::default();
        let props = AvrProperties::new(params.clone());
        let response = Response::new("SSF", "05", Zone::All);
        let deltas = SPEAKER_SYSTEM.decode_response(response, &params, &props).unwrap();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].value, json!("HDZone"));
        assert_eq!(deltas[1].property_name.as_deref(), Some("speaker_system_raw"));
        assert_eq!(deltas[1].value, json!("05"));
    }
}
