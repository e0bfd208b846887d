//! Decode deltas.
//!
//! A [`Response`] describes one property change produced by decoding a wire
//! frame. Specialised maps fan a single frame into many deltas, or attach a
//! callback that runs when the delta is committed and may emit further
//! deltas and follow-up queue commands.

use std::collections::HashSet;

use serde_json::Value;

use crate::params::AvrParams;
use crate::properties::{AvrProperties, BaseProperty};
use crate::queue::CommandItem;
use crate::types::Zone;

/// Callback invoked when a delta is dispatched; its returned deltas are
/// processed ahead of the remaining work and the original delta is not
/// committed. Plain function pointers keep callbacks data, not captures.
pub type DecoderCallback = fn(Response, &AvrParams, &mut AvrProperties) -> Vec<Response>;

#[derive(Clone)]
pub struct Response {
    /// Wire bytes after the matched prefix.
    pub code: String,
    /// The matched response prefix.
    pub response_command: String,
    pub base_property: Option<BaseProperty>,
    pub property_name: Option<String>,
    pub zone: Option<Zone>,
    /// Extra zones whose callbacks should fire regardless of `zone`.
    pub update_zones: HashSet<Zone>,
    pub value: Value,
    pub queue_commands: Vec<CommandItem>,
    pub callback: Option<DecoderCallback>,
}

impl Response {
    pub fn new(response_command: impl Into<String>, code: impl Into<String>, zone: Zone) -> Self {
        Response {
            code: code.into(),
            response_command: response_command.into(),
            base_property: None,
            property_name: None,
            zone: Some(zone),
            update_zones: HashSet::new(),
            value: Value::Null,
            queue_commands: Vec::new(),
            callback: None,
        }
    }

    /// Clone inheriting the property target and value but not queue commands
    /// or callback, mirroring delta cloning in compound decoders.
    pub fn derive(&self) -> Response {
        Response {
            code: self.code.clone(),
            response_command: self.response_command.clone(),
            base_property: self.base_property,
            property_name: self.property_name.clone(),
            zone: self.zone,
            update_zones: self.update_zones.clone(),
            value: self.value.clone(),
            queue_commands: Vec::new(),
            callback: None,
        }
    }

    /// Derived delta for a sub-code of a compound frame.
    pub fn child(&self, code: impl Into<String>) -> Response {
        let mut child = self.derive();
        child.code = code.into();
        child.value = Value::Null;
        child.property_name = None;
        child
    }

    pub fn with_property(mut self, base: BaseProperty, name: Option<&str>) -> Response {
        self.base_property = Some(base);
        self.property_name = name.map(str::to_string);
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Response {
        self.value = value.into();
        self
    }

    pub fn with_callback(mut self, callback: DecoderCallback) -> Response {
        self.callback = Some(callback);
        self
    }

    pub fn with_queue_commands(mut self, commands: Vec<CommandItem>) -> Response {
        self.queue_commands = commands;
        self
    }

    pub fn with_update_zones(mut self, zones: impl IntoIterator<Item = Zone>) -> Response {
        self.update_zones = zones.into_iter().collect();
        self
    }

    /// Clear the property target so the delta only carries side effects.
    pub fn clear_property(mut self) -> Response {
        self.base_property = None;
        self.property_name = None;
        self
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("code", &self.code)
            .field("response_command", &self.response_command)
            .field("base_property", &self.base_property)
            .field("property_name", &self.property_name)
            .field("zone", &self.zone)
            .field("update_zones", &self.update_zones)
            .field("value", &self.value)
            .field("queue_commands", &self.queue_commands.len())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
