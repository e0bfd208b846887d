//! Per-device parameters: built-in defaults, model-derived defaults and user
//! overrides, deep-merged into an effective table.
//!
//! The effective value of a key is user over model over built-in. Dict values
//! merge recursively; list values are replaced by the higher layer. Observers
//! registered with [`AvrParams::register_update_callback`] run synchronously
//! after every recomputation.

mod models;

pub use models::model_defaults_for;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::types::Zone;

pub const PARAM_MODEL: &str = "model";
pub const PARAM_IGNORED_ZONES: &str = "ignored_zones";
pub const PARAM_COMMAND_DELAY: &str = "command_delay";
pub const PARAM_MAX_SOURCE_ID: &str = "max_source_id";
pub const PARAM_MAX_VOLUME: &str = "max_volume";
pub const PARAM_MAX_VOLUME_ZONEX: &str = "max_volume_zonex";
pub const PARAM_POWER_ON_VOLUME_BOUNCE: &str = "power_on_volume_bounce";
pub const PARAM_VOLUME_STEP_ONLY: &str = "volume_step_only";
pub const PARAM_IGNORE_VOLUME_CHECK: &str = "ignore_volume_check";
pub const PARAM_ALWAYS_POLL: &str = "always_poll";
pub const PARAM_DISABLE_AUTO_QUERY: &str = "disable_auto_query";
pub const PARAM_ZONE_1_SOURCES: &str = "zone_1_sources";
pub const PARAM_ZONE_2_SOURCES: &str = "zone_2_sources";
pub const PARAM_ZONE_3_SOURCES: &str = "zone_3_sources";
pub const PARAM_HDZONE_SOURCES: &str = "hdzone_sources";
pub const PARAM_HDZONE_VOLUME_REQUIREMENTS: &str = "hdzone_volume_requirements";
pub const PARAM_SPEAKER_SYSTEM_MODES: &str = "amp_speaker_system_modes";
pub const PARAM_EXTRA_LISTENING_MODES: &str = "extra_amp_listening_modes";
pub const PARAM_ENABLED_LISTENING_MODES: &str = "enabled_amp_listening_modes";
pub const PARAM_DISABLED_LISTENING_MODES: &str = "disabled_amp_listening_modes";
pub const PARAM_VIDEO_RESOLUTION_MODES: &str = "video_resolution_modes";
pub const PARAM_MHL_SOURCE: &str = "mhl_source";
pub const PARAM_TUNER_AM_FREQ_STEP: &str = "am_frequency_step";
pub const PARAM_DEBUG_LISTENER: &str = "debug_listener";
pub const PARAM_DEBUG_UPDATER: &str = "debug_updater";
pub const PARAM_DEBUG_COMMAND: &str = "debug_command";
pub const PARAM_DEBUG_COMMAND_QUEUE: &str = "debug_command_queue";

/// Parameter key holding the allowed source list for a zone.
pub fn zone_sources_param(zone: Zone) -> &'static str {
    match zone {
        Zone::Z2 => PARAM_ZONE_2_SOURCES,
        Zone::Z3 => PARAM_ZONE_3_SOURCES,
        Zone::Hdz => PARAM_HDZONE_SOURCES,
        _ => PARAM_ZONE_1_SOURCES,
    }
}

/// Built-in parameter defaults.
fn default_params() -> Map<String, Value> {
    let defaults = json!({
        PARAM_MODEL: null,
        PARAM_IGNORED_ZONES: [],
        PARAM_COMMAND_DELAY: 0.1,
        PARAM_MAX_SOURCE_ID: 60,
        PARAM_MAX_VOLUME: 185,
        PARAM_MAX_VOLUME_ZONEX: 81,
        PARAM_POWER_ON_VOLUME_BOUNCE: false,
        PARAM_VOLUME_STEP_ONLY: false,
        PARAM_IGNORE_VOLUME_CHECK: true,
        PARAM_ALWAYS_POLL: false,
        PARAM_DISABLE_AUTO_QUERY: false,
        PARAM_ZONE_1_SOURCES: [],
        PARAM_ZONE_2_SOURCES: [4, 6, 15, 26, 38, 53, 41, 44, 45, 17, 13, 5, 1, 2, 33, 46, 47, 99, 10],
        PARAM_ZONE_3_SOURCES: [4, 6, 15, 26, 38, 53, 41, 44, 45, 17, 13, 5, 1, 2, 33, 46, 47, 99, 10],
        PARAM_HDZONE_SOURCES: [25, 4, 6, 10, 15, 19, 20, 21, 22, 23, 24, 34, 35, 26, 38, 53, 41, 44, 45, 17, 13, 33, 31, 46, 47, 48],
        PARAM_HDZONE_VOLUME_REQUIREMENTS: ["13", "15", "05", "25"],
        PARAM_SPEAKER_SYSTEM_MODES: models::speaker_system_modes_default(),
        PARAM_EXTRA_LISTENING_MODES: {},
        PARAM_ENABLED_LISTENING_MODES: [],
        PARAM_DISABLED_LISTENING_MODES: [],
        PARAM_VIDEO_RESOLUTION_MODES: ["0", "1", "3", "4", "5", "6", "7", "8", "9"],
        PARAM_MHL_SOURCE: null,
        PARAM_TUNER_AM_FREQ_STEP: null,
        PARAM_DEBUG_LISTENER: false,
        PARAM_DEBUG_UPDATER: false,
        PARAM_DEBUG_COMMAND: false,
        PARAM_DEBUG_COMMAND_QUEUE: false,
    });
    match defaults {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Recursively merge `overlay` into `base`: objects merge key-wise, all other
/// values (lists included) are replaced by the overlay.
fn merge(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(dst)), Value::Object(src)) => merge(dst, src),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

struct ParamsInner {
    default_params: Map<String, Value>,
    user_params: Map<String, Value>,
    params: Map<String, Value>,
}

type UpdateCallback = Box<dyn Fn() + Send + Sync>;

/// Layered AVR parameters with synchronous change notification.
#[derive(Clone)]
pub struct AvrParams {
    inner: Arc<Mutex<ParamsInner>>,
    callbacks: Arc<Mutex<Vec<UpdateCallback>>>,
}

impl Default for AvrParams {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

impl AvrParams {
    pub fn new(user_params: Map<String, Value>) -> Self {
        let params = AvrParams {
            inner: Arc::new(Mutex::new(ParamsInner {
                default_params: default_params(),
                user_params: Map::new(),
                params: Map::new(),
            })),
            callbacks: Arc::new(Mutex::new(Vec::new())),
        };
        if let Some(Value::String(model)) = user_params.get(PARAM_MODEL) {
            params.set_default_params_model(&model.clone());
        }
        params.set_user_params(user_params);
        params
    }

    /// Register a callback invoked synchronously after every effective-value
    /// recomputation. Callbacks must not call back into a parameter setter.
    pub fn register_update_callback(&self, callback: UpdateCallback) {
        self.callbacks.lock().push(callback);
    }

    fn update_params(&self) {
        {
            let mut inner = self.inner.lock();
            let mut params = inner.default_params.clone();
            let user = inner.user_params.clone();
            merge(&mut params, &user);
            inner.params = params;
        }
        for callback in self.callbacks.lock().iter() {
            callback();
        }
    }

    /// Recompute model-derived defaults for `model` and re-merge. The first
    /// matching entry in the ordered model table wins.
    pub fn set_default_params_model(&self, model: &str) {
        {
            let mut inner = self.inner.lock();
            let mut defaults = default_params();
            if model != "unknown" {
                if let Some((pattern, model_params)) = model_defaults_for(model) {
                    info!("applying default parameters for model {model} ({pattern})");
                    merge(&mut defaults, &model_params);
                }
            }
            defaults.insert(PARAM_MODEL.to_string(), Value::String(model.to_string()));
            inner.default_params = defaults;
        }
        self.update_params();
    }

    /// Replace all user parameters.
    pub fn set_user_params(&self, params: Map<String, Value>) {
        debug!("set_user_params({params:?})");
        self.inner.lock().user_params = params;
        self.update_params();
    }

    /// Set a single user parameter. Setting `model` recomputes model defaults
    /// before merging.
    pub fn set_user_param(&self, param: &str, value: Value) {
        if param == PARAM_MODEL {
            if let Value::String(model) = &value {
                let model = model.clone();
                self.inner.lock().user_params.insert(param.to_string(), value);
                self.set_default_params_model(&model);
                return;
            }
        }
        self.inner.lock().user_params.insert(param.to_string(), value);
        self.update_params();
    }

    /// Copy of the current user parameters.
    pub fn user_params(&self) -> Map<String, Value> {
        self.inner.lock().user_params.clone()
    }

    /// Copy of all effective parameters.
    pub fn params_all(&self) -> Map<String, Value> {
        self.inner.lock().params.clone()
    }

    pub fn get_param(&self, name: &str) -> Option<Value> {
        self.inner.lock().params.get(name).cloned().filter(|v| !v.is_null())
    }

    pub fn get_bool(&self, name: &str) -> bool {
        matches!(self.get_param(name), Some(Value::Bool(true)))
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get_param(name).and_then(|v| v.as_i64())
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get_param(name).and_then(|v| v.as_f64())
    }

    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get_param(name).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn get_int_list(&self, name: &str) -> Vec<i64> {
        self.get_param(name)
            .and_then(|v| v.as_array().map(|a| a.iter().filter_map(Value::as_i64).collect()))
            .unwrap_or_default()
    }

    pub fn get_str_list(&self, name: &str) -> Vec<String> {
        self.get_param(name)
            .and_then(|v| {
                v.as_array()
                    .map(|a| a.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
            })
            .unwrap_or_default()
    }

    pub fn get_map(&self, name: &str) -> Map<String, Value> {
        self.get_param(name)
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Zones excluded from discovery.
    pub fn ignored_zones(&self) -> Vec<Zone> {
        self.get_str_list(PARAM_IGNORED_ZONES)
            .iter()
            .filter_map(|id| Zone::from_id(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn defaults_present() {
        let params = AvrParams::default();
        assert_eq!(params.get_i64(PARAM_MAX_VOLUME), Some(185));
        assert_eq!(params.get_f64(PARAM_COMMAND_DELAY), Some(0.1));
        assert!(!params.get_bool(PARAM_POWER_ON_VOLUME_BOUNCE));
        assert!(params.get_param(PARAM_MHL_SOURCE).is_none());
    }

    #[test]
    fn user_overrides_defaults() {
        let params = AvrParams::default();
        params.set_user_param(PARAM_MAX_VOLUME, json!(100));
        assert_eq!(params.get_i64(PARAM_MAX_VOLUME), Some(100));
        // lists are replaced, not merged
        params.set_user_param(PARAM_ZONE_2_SOURCES, json!([1, 2]));
        assert_eq!(params.get_int_list(PARAM_ZONE_2_SOURCES), vec![1, 2]);
    }

    #[test]
    fn model_defaults_applied_on_first_match() {
        let params = AvrParams::default();
        params.set_default_params_model("VSX-930-K");
        assert!(!params.get_int_list(PARAM_ENABLED_LISTENING_MODES).is_empty());
        assert_eq!(params.get_str(PARAM_MODEL).as_deref(), Some("VSX-930-K"));
    }

    #[test]
    fn user_params_survive_model_change() {
        let params = AvrParams::default();
        params.set_user_param(PARAM_MAX_VOLUME, json!(120));
        params.set_default_params_model("SC-LX79");
        assert_eq!(params.get_i64(PARAM_MAX_VOLUME), Some(120));
        // model default replaced the built-in list
        assert_eq!(params.get_str_list(PARAM_HDZONE_VOLUME_REQUIREMENTS), Vec::<String>::new());
    }

    #[test]
    fn observers_fire_synchronously() {
        let params = AvrParams::default();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        params.register_update_callback(Box::new(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        }));
        params.set_user_param(PARAM_ALWAYS_POLL, json!(true));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        params.set_user_params(Map::new());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn setting_model_param_recomputes_model_defaults() {
        let params = AvrParams::default();
        params.set_user_param(PARAM_MODEL, json!("VSX-S510"));
        assert!(params.get_bool(PARAM_VOLUME_STEP_ONLY));
    }
}
