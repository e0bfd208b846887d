//! Cached device state.
//!
//! The property store is the canonical view of the receiver, written by the
//! decoder dispatcher and read through the facade. It owns the command queue
//! so that decoder callbacks have a stable channel for follow-up commands
//! without holding a reference to the client.

pub mod modes;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::params::{
    zone_sources_param, AvrParams, PARAM_DEBUG_COMMAND_QUEUE, PARAM_DISABLED_LISTENING_MODES,
    PARAM_ENABLED_LISTENING_MODES, PARAM_EXTRA_LISTENING_MODES, PARAM_MODEL,
    PARAM_TUNER_AM_FREQ_STEP,
};
use crate::queue::CommandQueue;
use crate::types::{Zone, SOURCE_TUNER};

/// Shared handle to the property store. Writers take the lock exclusively,
/// readers take it shared; critical sections never span an await.
pub type SharedProperties = Arc<RwLock<AvrProperties>>;

/// Top-level property targets a decoded delta can commit to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseProperty {
    Power,
    Volume,
    Mute,
    SourceId,
    SourceName,
    MediaControlMode,
    Tone,
    ChannelLevels,
    ListeningMode,
    ListeningModeRaw,
    SourceNameToId,
    SourceIdToName,
    Amp,
    Tuner,
    Dsp,
    Video,
    System,
    Audio,
}

impl fmt::Display for BaseProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BaseProperty::Power => "power",
            BaseProperty::Volume => "volume",
            BaseProperty::Mute => "mute",
            BaseProperty::SourceId => "source_id",
            BaseProperty::SourceName => "source_name",
            BaseProperty::MediaControlMode => "media_control_mode",
            BaseProperty::Tone => "tone",
            BaseProperty::ChannelLevels => "channel_levels",
            BaseProperty::ListeningMode => "listening_mode",
            BaseProperty::ListeningModeRaw => "listening_mode_raw",
            BaseProperty::SourceNameToId => "source_name_to_id",
            BaseProperty::SourceIdToName => "source_id_to_name",
            BaseProperty::Amp => "amp",
            BaseProperty::Tuner => "tuner",
            BaseProperty::Dsp => "dsp",
            BaseProperty::Video => "video",
            BaseProperty::System => "system",
            BaseProperty::Audio => "audio",
        })
    }
}

/// One entry of the listening-mode catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct ListeningModeInfo {
    pub name: String,
    pub two_channel: bool,
    pub multichannel: bool,
}

/// In-memory AVR state.
pub struct AvrProperties {
    params: AvrParams,

    pub zones: BTreeSet<Zone>,
    pub zones_initial_refresh: BTreeSet<Zone>,
    pub command_queue: CommandQueue,

    pub power: HashMap<Zone, bool>,
    pub volume: HashMap<Zone, i64>,
    pub max_volume: HashMap<Zone, i64>,
    pub mute: HashMap<Zone, bool>,
    pub source_id: HashMap<Zone, i64>,
    pub source_name: HashMap<Zone, String>,
    pub media_control_mode: HashMap<Zone, String>,
    pub tone: HashMap<Zone, Map<String, Value>>,
    pub channel_levels: HashMap<Zone, Map<String, Value>>,

    pub listening_mode: Option<String>,
    pub listening_mode_raw: Option<String>,
    pub listening_modes_all: BTreeMap<String, ListeningModeInfo>,
    pub available_listening_modes: BTreeMap<String, String>,

    pub amp: Map<String, Value>,
    pub tuner: Map<String, Value>,
    pub dsp: Map<String, Value>,
    pub video: Map<String, Value>,
    pub system: Map<String, Value>,
    pub audio: Map<String, Value>,

    /// Whether decoded source-name frames update the source map:
    /// `None` = unknown, `Some(true)` = enabled, `Some(false)` = disabled
    /// (set when the user supplies the map manually).
    pub query_sources: Option<bool>,
    pub source_name_to_id: HashMap<String, i64>,
    pub source_id_to_name: BTreeMap<i64, String>,
}

impl AvrProperties {
    pub fn new(params: AvrParams) -> Self {
        let command_queue = CommandQueue::new(params.get_bool(PARAM_DEBUG_COMMAND_QUEUE));
        let mut amp = Map::new();
        amp.insert("model".into(), params.get_param(PARAM_MODEL).unwrap_or(Value::Null));
        amp.insert("software_version".into(), Value::Null);
        amp.insert("mac_addr".into(), Value::Null);
        let mut tuner = Map::new();
        tuner.insert(
            "am_frequency_step".into(),
            params.get_param(PARAM_TUNER_AM_FREQ_STEP).unwrap_or(Value::Null),
        );
        let mut properties = AvrProperties {
            params,
            zones: BTreeSet::new(),
            zones_initial_refresh: BTreeSet::new(),
            command_queue,
            power: HashMap::new(),
            volume: HashMap::new(),
            max_volume: HashMap::new(),
            mute: HashMap::new(),
            source_id: HashMap::new(),
            source_name: HashMap::new(),
            media_control_mode: HashMap::new(),
            tone: HashMap::new(),
            channel_levels: HashMap::new(),
            listening_mode: None,
            listening_mode_raw: None,
            listening_modes_all: BTreeMap::new(),
            available_listening_modes: BTreeMap::new(),
            amp,
            tuner,
            dsp: Map::new(),
            video: Map::new(),
            system: Map::new(),
            audio: Map::new(),
            query_sources: None,
            source_name_to_id: HashMap::new(),
            source_id_to_name: BTreeMap::new(),
        };
        properties.update_listening_modes();
        properties
    }

    pub fn params(&self) -> &AvrParams {
        &self.params
    }

    /// Reset cached state. Identifying fields (`amp.model`,
    /// `amp.software_version`, `amp.mac_addr`, `tuner.am_frequency_step`)
    /// survive across reconnects.
    pub fn reset(&mut self) {
        info!("resetting cached AVR properties");
        self.zones_initial_refresh.clear();
        self.command_queue.purge();
        self.power.clear();
        self.volume.clear();
        self.mute.clear();
        self.source_id.clear();
        self.source_name.clear();
        self.media_control_mode.clear();
        self.tone.clear();
        self.channel_levels.clear();
        self.listening_mode = None;
        self.listening_mode_raw = None;
        let mut amp = Map::new();
        for key in ["model", "software_version", "mac_addr"] {
            amp.insert(key.into(), self.amp.get(key).cloned().unwrap_or(Value::Null));
        }
        self.amp = amp;
        let mut tuner = Map::new();
        tuner.insert(
            "am_frequency_step".into(),
            self.tuner.get("am_frequency_step").cloned().unwrap_or(Value::Null),
        );
        self.tuner = tuner;
        self.dsp = Map::new();
        self.video = Map::new();
        self.system = Map::new();
        self.audio = Map::new();
        self.query_sources = None;
    }

    /// Replace the source ID to name mapping and stop updating it from
    /// decoded source-name frames.
    pub fn set_source_dict(&mut self, sources: BTreeMap<i64, String>) -> Result<(), Error> {
        self.query_sources = Some(false);
        self.source_name_to_id = sources.iter().map(|(id, name)| (name.clone(), *id)).collect();
        if self.source_name_to_id.len() != sources.len() {
            self.query_sources = None;
            self.source_name_to_id.clear();
            return Err(Error::local("set_source_dict", "duplicate source names in source dict"));
        }
        self.source_id_to_name = sources;
        Ok(())
    }

    /// Available input source names for a zone, filtered by the per-zone
    /// allowed-source parameter.
    pub fn get_source_list(&self, zone: Zone) -> Vec<String> {
        let source_ids = self.params.get_int_list(zone_sources_param(zone));
        if source_ids.is_empty() {
            return self.source_id_to_name.values().cloned().collect();
        }
        self.source_id_to_name
            .iter()
            .filter(|(id, _)| source_ids.contains(id))
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Source ID to name mapping for a zone.
    pub fn get_source_dict(&self, zone: Option<Zone>) -> BTreeMap<i64, String> {
        let source_ids = zone.map(|z| self.params.get_int_list(zone_sources_param(z)));
        match source_ids {
            Some(ids) if !ids.is_empty() => self
                .source_id_to_name
                .iter()
                .filter(|(id, _)| ids.contains(id))
                .map(|(id, name)| (*id, name.clone()))
                .collect(),
            _ => self.source_id_to_name.clone(),
        }
    }

    /// Source name for an ID, falling back to the ID itself.
    pub fn get_source_name(&self, source_id: i64) -> String {
        self.source_id_to_name.get(&source_id).cloned().unwrap_or_else(|| source_id.to_string())
    }

    /// Whether the given source, or any powered-on zone's source, is the
    /// tuner.
    pub fn is_source_tuner(&self, source: Option<i64>) -> bool {
        if let Some(source) = source {
            return source == SOURCE_TUNER;
        }
        self.source_id
            .iter()
            .any(|(zone, source)| *source == SOURCE_TUNER && self.power.get(zone) == Some(&true))
    }

    /// Media control actions valid for a zone's current source, or `None`
    /// when the source has no media controls.
    pub fn get_supported_media_controls(&self, zone: Zone) -> Option<Vec<String>> {
        let mode = self.media_control_mode.get(&zone)?;
        modes::media_control_actions(mode)
            .map(|actions| actions.iter().map(|(action, _)| action.to_string()).collect())
    }

    /// Generic property sub-map for a base property, when it has one.
    pub fn bag(&self, base: BaseProperty) -> Option<&Map<String, Value>> {
        match base {
            BaseProperty::Amp => Some(&self.amp),
            BaseProperty::Tuner => Some(&self.tuner),
            BaseProperty::Dsp => Some(&self.dsp),
            BaseProperty::Video => Some(&self.video),
            BaseProperty::System => Some(&self.system),
            BaseProperty::Audio => Some(&self.audio),
            _ => None,
        }
    }

    pub fn bag_mut(&mut self, base: BaseProperty) -> Option<&mut Map<String, Value>> {
        match base {
            BaseProperty::Amp => Some(&mut self.amp),
            BaseProperty::Tuner => Some(&mut self.tuner),
            BaseProperty::Dsp => Some(&mut self.dsp),
            BaseProperty::Video => Some(&mut self.video),
            BaseProperty::System => Some(&mut self.system),
            BaseProperty::Audio => Some(&mut self.audio),
            _ => None,
        }
    }

    /// Rebuild the listening-mode catalogue from the base table plus the
    /// `extra_amp_listening_modes` parameter, then derive the set available
    /// for the current input.
    pub fn update_listening_modes(&mut self) {
        let mut all: BTreeMap<String, ListeningModeInfo> = modes::LISTENING_MODES
            .iter()
            .map(|(code, name, two_ch, multi)| {
                (
                    code.to_string(),
                    ListeningModeInfo {
                        name: name.to_string(),
                        two_channel: *two_ch,
                        multichannel: *multi,
                    },
                )
            })
            .collect();
        for (code, entry) in self.params.get_map(PARAM_EXTRA_LISTENING_MODES) {
            let Some(fields) = entry.as_array() else { continue };
            let Some(name) = fields.first().and_then(Value::as_str) else { continue };
            all.insert(
                code,
                ListeningModeInfo {
                    name: name.to_string(),
                    two_channel: fields.get(1).and_then(Value::as_bool).unwrap_or(true),
                    multichannel: fields.get(2).and_then(Value::as_bool).unwrap_or(true),
                },
            );
        }

        let disabled = self.params.get_int_list(PARAM_DISABLED_LISTENING_MODES);
        let enabled = self.params.get_int_list(PARAM_ENABLED_LISTENING_MODES);
        let multichannel =
            self.audio.get("input_multichannel").and_then(Value::as_bool).unwrap_or(false);

        debug!("determining available listening modes");
        let mut available = BTreeMap::new();
        let mut seen_names: Vec<String> = Vec::new();
        for (code, info) in &all {
            let mode_id = code.parse::<i64>().unwrap_or(-1);
            if disabled.contains(&mode_id) || (!enabled.is_empty() && !enabled.contains(&mode_id)) {
                continue;
            }
            if seen_names.contains(&info.name) {
                warn!("ignored duplicate listening mode name: {}", info.name);
                continue;
            }
            if (multichannel && info.multichannel) || (!multichannel && info.two_channel) {
                available.insert(code.clone(), info.name.clone());
            }
            seen_names.push(info.name.clone());
        }
        self.listening_modes_all = all;
        self.available_listening_modes = available;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PARAM_ZONE_2_SOURCES;
    use serde_json::json;

    fn store() -> AvrProperties {
        AvrProperties::new(AvrParams::default())
    }

    #[test]
    fn source_dict_is_bijective() {
        let mut props = store();
        let sources = BTreeMap::from([(2, "TUNER".to_string()), (25, "BD".to_string())]);
        props.set_source_dict(sources).unwrap();
        assert_eq!(props.query_sources, Some(false));
        for (id, name) in &props.source_id_to_name {
            assert_eq!(props.source_name_to_id.get(name), Some(id));
        }
        for (name, id) in &props.source_name_to_id {
            assert_eq!(props.source_id_to_name.get(id), Some(name));
        }
    }

    #[test]
    fn duplicate_source_names_rejected() {
        let mut props = store();
        let sources = BTreeMap::from([(2, "DUP".to_string()), (3, "DUP".to_string())]);
        assert!(props.set_source_dict(sources).is_err());
        assert!(props.source_id_to_name.is_empty());
    }

    #[test]
    fn source_list_filtered_by_zone_parameter() {
        let mut props = store();
        props
            .set_source_dict(BTreeMap::from([
                (1, "CD".to_string()),
                (4, "DVD".to_string()),
                (60, "NOT LISTED".to_string()),
            ]))
            .unwrap();
        props.params().set_user_param(PARAM_ZONE_2_SOURCES, json!([1, 4]));
        let list = props.get_source_list(Zone::Z2);
        assert!(list.contains(&"CD".to_string()));
        assert!(!list.contains(&"NOT LISTED".to_string()));
        // Zone 1 allows everything by default
        assert_eq!(props.get_source_list(Zone::Z1).len(), 3);
    }

    #[test]
    fn tuner_detection_requires_power() {
        let mut props = store();
        props.source_id.insert(Zone::Z1, SOURCE_TUNER);
        assert!(!props.is_source_tuner(None));
        props.power.insert(Zone::Z1, true);
        assert!(props.is_source_tuner(None));
        assert!(props.is_source_tuner(Some(SOURCE_TUNER)));
        assert!(!props.is_source_tuner(Some(25)));
    }

    #[test]
    fn listening_modes_filtered_by_channel_layout() {
        let mut props = store();
        props.update_listening_modes();
        // 2ch input: "Multi ch" (0021, multichannel only) must be absent
        assert!(props.available_listening_modes.contains_key("0001"));
        assert!(!props.available_listening_modes.contains_key("0021"));

        props.audio.insert("input_multichannel".into(), json!(true));
        props.update_listening_modes();
        assert!(props.available_listening_modes.contains_key("0021"));
        // 2ch-only mode filtered out on multichannel input
        assert!(!props.available_listening_modes.contains_key("0009"));
    }

    #[test]
    fn enabled_and_disabled_mode_parameters() {
        let props_params = AvrParams::default();
        props_params.set_user_param(PARAM_ENABLED_LISTENING_MODES, json!([1, 6]));
        props_params.set_user_param(PARAM_DISABLED_LISTENING_MODES, json!([6]));
        let mut props = AvrProperties::new(props_params);
        props.update_listening_modes();
        assert_eq!(
            props.available_listening_modes.keys().collect::<Vec<_>>(),
            vec!["0001"]
        );
    }

    #[test]
    fn extra_listening_modes_merge_and_duplicates_drop() {
        let params = AvrParams::default();
        params.set_user_param(
            PARAM_EXTRA_LISTENING_MODES,
            json!({"0300": ["STEREO", true, true], "0301": ["CUSTOM MODE", true, true]}),
        );
        let mut props = AvrProperties::new(params);
        props.update_listening_modes();
        assert!(props.listening_modes_all.contains_key("0301"));
        // "STEREO" duplicates mode 0001 and is dropped from the available set
        assert!(!props.available_listening_modes.contains_key("0300"));
        assert!(props.available_listening_modes.contains_key("0301"));
    }

    #[test]
    fn reset_preserves_identity_fields() {
        let mut props = store();
        props.amp.insert("model".into(), json!("VSX-930"));
        props.amp.insert("dimmer".into(), json!("bright"));
        props.tuner.insert("am_frequency_step".into(), json!(9));
        props.tuner.insert("frequency".into(), json!(531));
        props.power.insert(Zone::Z1, true);
        props.zones.insert(Zone::Z1);
        props.zones_initial_refresh.insert(Zone::Z1);
        props.reset();
        assert_eq!(props.amp.get("model"), Some(&json!("VSX-930")));
        assert_eq!(props.amp.get("dimmer"), None);
        assert_eq!(props.tuner.get("am_frequency_step"), Some(&json!(9)));
        assert_eq!(props.tuner.get("frequency"), None);
        assert!(props.power.is_empty());
        assert!(props.zones_initial_refresh.is_empty());
        // discovered zones survive a reset
        assert!(props.zones.contains(&Zone::Z1));
    }
}
