//! Response decoder dispatcher.
//!
//! Takes a raw wire frame, finds the longest matching registered prefix,
//! decodes it into deltas and commits them to the property store. Delta
//! callbacks are expanded through an explicit work queue: their results are
//! processed ahead of the remaining deltas and the originating delta is not
//! committed.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::decoders::response::Response;
use crate::error::Error;
use crate::params::AvrParams;
use crate::properties::{AvrProperties, BaseProperty};
use crate::registry::REGISTRY;
use crate::types::Zone;

/// Process a raw response frame: decode and apply to the property store,
/// returning the set of zones whose state was touched.
pub fn process_raw_response(
    raw: &str,
    params: &AvrParams,
    properties: &mut AvrProperties,
) -> Result<HashSet<Zone>, Error> {
    let Some((prefix, code_map, zone)) = REGISTRY.match_response(raw) else {
        // not all responses are captured by the decoder table
        if !(raw.starts_with('E') || raw == "B00") {
            debug!("undecoded response: {raw}");
        }
        return Ok(HashSet::new());
    };

    let seed = Response::new(prefix, &raw[prefix.len()..], zone);
    let decoded = code_map
        .decode_response(seed, params, properties)
        .map_err(|err| Error::ResponseDecode { response: raw.to_string(), reason: err.to_string() })?;

    let mut work: VecDeque<Response> = decoded.into();
    let mut updated_zones: HashSet<Zone> = HashSet::new();
    while let Some(mut response) = work.pop_front() {
        if let Some(callback) = response.callback.take() {
            // callback results run before the remaining deltas; the original
            // delta is not committed
            let expanded = callback(response, params, properties);
            for response in expanded.into_iter().rev() {
                work.push_front(response);
            }
            continue;
        }
        commit_response(properties, &response)
            .map_err(|err| Error::ResponseDecode { response: raw.to_string(), reason: err.to_string() })?;
        if let Some(zone) = response.zone {
            updated_zones.insert(zone);
        }
        updated_zones.extend(response.update_zones.iter().copied());
        if !response.queue_commands.is_empty() {
            properties.command_queue.extend(response.queue_commands);
        }
    }
    Ok(updated_zones)
}

fn type_error(base: BaseProperty, value: &Value) -> Error {
    Error::ResponseDecode {
        response: base.to_string(),
        reason: format!("unexpected value {value} for {base}"),
    }
}

/// Register a zone the device reports state for, honouring the ignored-zones
/// parameter.
fn note_zone(properties: &mut AvrProperties, zone: Zone) {
    if properties.zones.contains(&zone) {
        return;
    }
    if properties.params().ignored_zones().contains(&zone) {
        return;
    }
    properties.zones.insert(zone);
}

fn commit_zone_scalar<T>(
    map: &mut HashMap<Zone, T>,
    zone: Zone,
    new_value: Option<T>,
    base: BaseProperty,
    code: &str,
) where
    T: PartialEq + std::fmt::Debug,
{
    let current = map.get(&zone);
    if current == new_value.as_ref() {
        return;
    }
    info!("{zone}: {base}: {:?} -> {:?} ({code:?})", map.get(&zone), new_value);
    match new_value {
        Some(value) => {
            map.insert(zone, value);
        }
        None => {
            map.remove(&zone);
        }
    }
}

fn commit_keyed(
    bag: &mut Map<String, Value>,
    context: &str,
    base: BaseProperty,
    name: &str,
    value: &Value,
    code: &str,
) {
    let current = bag.get(name);
    if current == Some(value) || (current.is_none() && value.is_null()) {
        return;
    }
    info!("{context}: {base}.{name}: {:?} -> {value:?} ({code:?})", bag.get(name));
    if value.is_null() {
        bag.remove(name);
    } else {
        bag.insert(name.to_string(), value.clone());
    }
}

/// Commit a single delta to the property store, logging every real change.
fn commit_response(properties: &mut AvrProperties, response: &Response) -> Result<(), Error> {
    let Some(base) = response.base_property else {
        return Ok(());
    };
    let zone = response.zone.filter(|zone| *zone != Zone::All);
    let value = &response.value;
    let code = response.code.as_str();

    // per-zone properties
    if matches!(
        base,
        BaseProperty::Power
            | BaseProperty::Volume
            | BaseProperty::Mute
            | BaseProperty::SourceId
            | BaseProperty::SourceName
            | BaseProperty::MediaControlMode
            | BaseProperty::Tone
            | BaseProperty::ChannelLevels
    ) {
        let Some(zone) = zone else {
            warn!("discarding zoneless {base} delta");
            return Ok(());
        };
        note_zone(properties, zone);
        match base {
            BaseProperty::Power => {
                let new_value = match value {
                    Value::Null => None,
                    Value::Bool(b) => Some(*b),
                    other => return Err(type_error(base, other)),
                };
                commit_zone_scalar(&mut properties.power, zone, new_value, base, code);
            }
            BaseProperty::Volume => {
                let new_value = match value {
                    Value::Null => None,
                    other => Some(other.as_i64().ok_or_else(|| type_error(base, other))?),
                };
                commit_zone_scalar(&mut properties.volume, zone, new_value, base, code);
            }
            BaseProperty::Mute => {
                let new_value = match value {
                    Value::Null => None,
                    Value::Bool(b) => Some(*b),
                    other => return Err(type_error(base, other)),
                };
                commit_zone_scalar(&mut properties.mute, zone, new_value, base, code);
            }
            BaseProperty::SourceId => {
                let new_value = match value {
                    Value::Null => None,
                    other => Some(other.as_i64().ok_or_else(|| type_error(base, other))?),
                };
                commit_zone_scalar(&mut properties.source_id, zone, new_value, base, code);
            }
            BaseProperty::SourceName | BaseProperty::MediaControlMode => {
                let new_value = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => return Err(type_error(base, other)),
                };
                let map = if base == BaseProperty::SourceName {
                    &mut properties.source_name
                } else {
                    &mut properties.media_control_mode
                };
                commit_zone_scalar(map, zone, new_value, base, code);
            }
            BaseProperty::Tone | BaseProperty::ChannelLevels => {
                let Some(name) = response.property_name.as_deref() else {
                    warn!("discarding keyless {base} delta");
                    return Ok(());
                };
                let map = if base == BaseProperty::Tone {
                    &mut properties.tone
                } else {
                    &mut properties.channel_levels
                };
                let bag = map.entry(zone).or_default();
                commit_keyed(bag, zone.full_name(), base, name, value, code);
            }
            _ => unreachable!(),
        }
        return Ok(());
    }

    // global properties
    match base {
        BaseProperty::ListeningMode | BaseProperty::ListeningModeRaw => {
            let new_value = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => return Err(type_error(base, other)),
            };
            let slot = if base == BaseProperty::ListeningMode {
                &mut properties.listening_mode
            } else {
                &mut properties.listening_mode_raw
            };
            if *slot != new_value {
                info!("Global: {base}: {:?} -> {new_value:?} ({code:?})", slot);
                *slot = new_value;
            }
        }
        BaseProperty::SourceNameToId => {
            let Some(name) = response.property_name.as_deref() else {
                return Ok(());
            };
            let new_value = value.as_i64();
            if properties.source_name_to_id.get(name).copied() != new_value {
                info!(
                    "Global: {base}.{name}: {:?} -> {new_value:?} ({code:?})",
                    properties.source_name_to_id.get(name)
                );
                match new_value {
                    Some(id) => {
                        properties.source_name_to_id.insert(name.to_string(), id);
                    }
                    None => {
                        properties.source_name_to_id.remove(name);
                    }
                }
            }
        }
        BaseProperty::SourceIdToName => {
            let Some(id) = response.property_name.as_deref().and_then(|s| s.parse::<i64>().ok())
            else {
                return Ok(());
            };
            let new_value = value.as_str().map(str::to_string);
            if properties.source_id_to_name.get(&id) != new_value.as_ref() {
                info!(
                    "Global: {base}.{id}: {:?} -> {new_value:?} ({code:?})",
                    properties.source_id_to_name.get(&id)
                );
                match new_value {
                    Some(name) => {
                        properties.source_id_to_name.insert(id, name);
                    }
                    None => {
                        properties.source_id_to_name.remove(&id);
                    }
                }
            }
        }
        BaseProperty::Amp
        | BaseProperty::Tuner
        | BaseProperty::Dsp
        | BaseProperty::Video
        | BaseProperty::System
        | BaseProperty::Audio => {
            let Some(name) = response.property_name.as_deref().map(str::to_string) else {
                warn!("discarding keyless {base} delta");
                return Ok(());
            };
            if let Some(bag) = properties.bag_mut(base) {
                commit_keyed(bag, "Global", base, &name, value, code);
            }
        }
        _ => unreachable!(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{PARAM_POWER_ON_VOLUME_BOUNCE, PARAM_TUNER_AM_FREQ_STEP};
    use crate::types::SOURCE_TUNER;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn setup() -> (AvrParams, AvrProperties) {
        let params = AvrParams::default();
        let properties = AvrProperties::new(params.clone());
        (params, properties)
    }

    #[test]
    fn power_on_queues_refresh_and_volume_bounce() {
        let (params, mut props) = setup();
        params.set_user_param(PARAM_POWER_ON_VOLUME_BOUNCE, json!(true));
        props.zones.insert(Zone::Z1);
        props.power.insert(Zone::Z1, false);

        let zones = process_raw_response("PWR0", &params, &mut props).unwrap();

        assert_eq!(props.power.get(&Zone::Z1), Some(&true));
        assert!(zones.contains(&Zone::All));
        let queue = &props.command_queue;
        let queue0: Vec<String> =
            queue.queue_items(0).iter().map(|item| item.command.clone()).collect();
        assert_eq!(queue0, vec!["volume_up", "volume_down"]);
        let queue2: Vec<String> =
            queue.queue_items(2).iter().map(|item| item.command.clone()).collect();
        assert_eq!(queue2, vec!["_delayed_refresh_zone"]);
        let queue3 = queue.queue_items(3);
        assert_eq!(queue3.len(), 1);
        assert_eq!(queue3[0].command, "_delayed_query_basic");
        assert_eq!(queue3[0].args, vec![json!(2.5)]);
    }

    #[test]
    fn power_off_queues_delayed_basic_query() {
        let (params, mut props) = setup();
        props.zones.insert(Zone::Z1);
        props.power.insert(Zone::Z1, true);
        process_raw_response("PWR1", &params, &mut props).unwrap();
        assert_eq!(props.power.get(&Zone::Z1), Some(&false));
        let queue3 = props.command_queue.queue_items(3);
        assert_eq!(queue3[0].args, vec![json!(4.5)]);
    }

    #[test]
    fn source_selection_to_tuner() {
        let (params, mut props) = setup();
        props.zones.insert(Zone::Z1);
        props
            .set_source_dict(BTreeMap::from([(SOURCE_TUNER, "TUNER".to_string())]))
            .unwrap();

        process_raw_response("FN02", &params, &mut props).unwrap();

        assert_eq!(props.source_id.get(&Zone::Z1), Some(&2));
        assert_eq!(props.source_name.get(&Zone::Z1).map(String::as_str), Some("TUNER"));
        assert_eq!(props.media_control_mode.get(&Zone::Z1).map(String::as_str), Some("TUNER"));
        let queue1: Vec<String> =
            props.command_queue.queue_items(1).iter().map(|item| item.command.clone()).collect();
        assert_eq!(queue1, vec!["query_tuner_frequency", "query_tuner_preset"]);
        assert_eq!(props.command_queue.queue_items(3)[0].command, "_delayed_query_basic");
    }

    #[test]
    fn am_frequency_step_glean_unambiguous() {
        let (params, mut props) = setup();
        props.zones.insert(Zone::Z1);
        props.power.insert(Zone::Z1, true);
        props.source_id.insert(Zone::Z1, SOURCE_TUNER);

        // 531 divides by 9 only
        process_raw_response("FRA00531", &params, &mut props).unwrap();

        assert_eq!(props.tuner.get("am_frequency_step"), Some(&json!(9)));
        assert!(props.command_queue.queue_items(0).is_empty());
        assert_eq!(props.tuner.get("frequency"), Some(&json!(531)));
        assert_eq!(props.tuner.get("band"), Some(&json!("AM")));
    }

    #[test]
    fn am_frequency_step_glean_ambiguous() {
        let (params, mut props) = setup();
        props.zones.insert(Zone::Z1);
        props.power.insert(Zone::Z1, true);
        props.source_id.insert(Zone::Z1, SOURCE_TUNER);

        // 540 divides by both 9 and 10
        process_raw_response("FRA00540", &params, &mut props).unwrap();

        assert!(props.tuner.get("am_frequency_step").map_or(true, Value::is_null));
        let queue0 = props.command_queue.queue_items(0);
        assert_eq!(queue0.len(), 1);
        assert_eq!(queue0[0].command, "_calculate_am_frequency_step");
    }

    #[test]
    fn am_frequency_step_parameter_survives_glean() {
        let (params, mut props) = setup();
        params.set_user_param(PARAM_TUNER_AM_FREQ_STEP, json!(10));
        props = AvrProperties::new(params.clone());
        props.zones.insert(Zone::Z1);
        process_raw_response("FRA00540", &params, &mut props).unwrap();
        assert_eq!(props.tuner.get("am_frequency_step"), Some(&json!(10)));
        assert!(props.command_queue.queue_items(0).is_empty());
    }

    #[test]
    fn dispatcher_is_idempotent() {
        let (params, mut props) = setup();
        props.zones.insert(Zone::Z1);
        process_raw_response("VOL100", &params, &mut props).unwrap();
        assert_eq!(props.volume.get(&Zone::Z1), Some(&100));
        process_raw_response("VOL100", &params, &mut props).unwrap();
        assert_eq!(props.volume.get(&Zone::Z1), Some(&100));
        assert_eq!(props.volume.len(), 1);
    }

    #[test]
    fn error_and_busy_frames_are_silently_ignored() {
        let (params, mut props) = setup();
        assert!(process_raw_response("E04", &params, &mut props).unwrap().is_empty());
        assert!(process_raw_response("B00", &params, &mut props).unwrap().is_empty());
        assert!(process_raw_response("XYZZY", &params, &mut props).unwrap().is_empty());
    }

    #[test]
    fn source_name_frames_update_bijection() {
        let (params, mut props) = setup();
        props.query_sources = Some(true);
        process_raw_response("RGB021TUNER", &params, &mut props).unwrap();
        assert_eq!(props.source_id_to_name.get(&2).map(String::as_str), Some("TUNER"));
        assert_eq!(props.source_name_to_id.get("TUNER"), Some(&2));

        // renaming the id replaces both directions
        process_raw_response("RGB020AM/FM", &params, &mut props).unwrap();
        assert_eq!(props.source_id_to_name.get(&2).map(String::as_str), Some("AM/FM"));
        assert!(props.source_name_to_id.get("TUNER").is_none());
        assert_eq!(props.source_name_to_id.len(), 1);
    }

    #[test]
    fn source_name_frames_ignored_when_sources_set_manually() {
        let (params, mut props) = setup();
        props.set_source_dict(BTreeMap::from([(25, "BD".to_string())])).unwrap();
        process_raw_response("RGB021TUNER", &params, &mut props).unwrap();
        assert!(props.source_name_to_id.get("TUNER").is_none());
        assert_eq!(props.source_id_to_name.len(), 1);
    }

    #[test]
    fn listening_mode_commits_name_and_raw() {
        let (params, mut props) = setup();
        process_raw_response("SR0001", &params, &mut props).unwrap();
        assert_eq!(props.listening_mode.as_deref(), Some("STEREO"));
        assert_eq!(props.listening_mode_raw.as_deref(), Some("0001"));
    }

    #[test]
    fn multichannel_change_queues_listening_mode_update() {
        let (params, mut props) = setup();
        props.zones.insert(Zone::Z1);
        let frame = format!("AST0301111{}", "0".repeat(33));
        process_raw_response(&frame, &params, &mut props).unwrap();
        assert_eq!(props.audio.get("input_multichannel"), Some(&json!(true)));
        assert_eq!(props.audio.get("input_channels.L"), Some(&json!("active")));
        let queue3: Vec<String> =
            props.command_queue.queue_items(3).iter().map(|item| item.command.clone()).collect();
        assert!(queue3.contains(&"_update_listening_modes".to_string()));
    }

    #[test]
    fn tuner_preset_cached_until_frequency_confirms() {
        let (params, mut props) = setup();
        props.zones.insert(Zone::Z1);
        // preset decoded: cached, not applied
        process_raw_response("PRA01", &params, &mut props).unwrap();
        assert!(props.tuner.get("preset").is_none());
        assert_eq!(props.tuner.get("cached_preset"), Some(&json!(["A", 1])));
        // frequency update applies the cached preset
        process_raw_response("FRF08750", &params, &mut props).unwrap();
        assert_eq!(props.tuner.get("class"), Some(&json!("A")));
        assert_eq!(props.tuner.get("preset"), Some(&json!(1)));
        // a later frequency change without a preset recall clears it
        process_raw_response("FRF08800", &params, &mut props).unwrap();
        assert!(props.tuner.get("preset").is_none() || props.tuner.get("preset") == Some(&Value::Null));
    }
}
