//! Static property registry.
//!
//! Built once at process init from the decoder modules' tables. Indexes wire
//! responses by prefix (longest match first), commands by name, and code
//! maps by family for introspective consumers.

use std::collections::HashMap;
use std::sync::LazyLock;

use tracing::warn;

use crate::decoders::code_map::{CodeMap, MapKind};
use crate::decoders::{amp, audio, dsp, information, system, tuner, video};
use crate::error::Error;
use crate::types::Zone;

/// One registered response: prefix, decoding map, zone.
pub type ResponseEntry = (&'static str, &'static dyn CodeMap, Zone);

/// A named AVR command with per-zone wire strings.
///
/// `wire` holds `(zone, command, expected response prefix)`; a command with
/// an expected response is sent as a request and waits on the response bus.
/// `args` is the code map used to format user arguments into the payload
/// prepended to the operation code.
pub struct CommandEntry {
    pub name: &'static str,
    pub wire: &'static [(Zone, &'static str, Option<&'static str>)],
    pub args: Option<&'static dyn CodeMap>,
}

impl CommandEntry {
    pub const fn new(
        name: &'static str,
        wire: &'static [(Zone, &'static str, Option<&'static str>)],
    ) -> Self {
        CommandEntry { name, wire, args: None }
    }

    pub const fn with_args(
        name: &'static str,
        wire: &'static [(Zone, &'static str, Option<&'static str>)],
        args: &'static dyn CodeMap,
    ) -> Self {
        CommandEntry { name, wire, args: Some(args) }
    }
}

/// Wire details resolved for one command on one zone.
#[derive(Clone, Copy)]
pub struct ResolvedCommand {
    pub command: &'static str,
    pub response_prefix: Option<&'static str>,
    pub args: Option<&'static dyn CodeMap>,
}

pub struct PropertyRegistry {
    /// Sorted by descending prefix length so that the first prefix match is
    /// the longest (`Z2MUT` is never shadowed by `MUT`).
    responses: Vec<ResponseEntry>,
    commands: HashMap<&'static str, &'static CommandEntry>,
}

impl PropertyRegistry {
    fn build() -> Self {
        let mut responses: Vec<ResponseEntry> = Vec::new();
        responses.extend_from_slice(amp::RESPONSES);
        responses.extend_from_slice(system::RESPONSES);
        responses.extend_from_slice(audio::RESPONSES);
        responses.extend_from_slice(tuner::RESPONSES);
        responses.extend_from_slice(dsp::RESPONSES);
        responses.extend_from_slice(video::RESPONSES);
        responses.extend_from_slice(information::RESPONSES);
        responses.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        let mut commands: HashMap<&'static str, &'static CommandEntry> = HashMap::new();
        for table in [
            amp::COMMANDS,
            system::COMMANDS,
            audio::COMMANDS,
            tuner::COMMANDS,
            dsp::COMMANDS,
            video::COMMANDS,
            information::COMMANDS,
        ] {
            for entry in table {
                if commands.insert(entry.name, entry).is_some() {
                    warn!("duplicate command {} detected", entry.name);
                }
            }
        }
        PropertyRegistry { responses, commands }
    }

    /// Longest-prefix match of a raw response against the registered
    /// prefixes.
    pub fn match_response(&self, raw: &str) -> Option<ResponseEntry> {
        self.responses.iter().find(|(prefix, _, _)| raw.starts_with(prefix)).copied()
    }

    /// Resolve a command name for a zone.
    pub fn get_command(&self, name: &str, zone: Zone) -> Result<ResolvedCommand, Error> {
        let entry = self
            .commands
            .get(name)
            .ok_or_else(|| Error::UnknownCommand { command: name.to_string(), zone })?;
        let (_, command, response_prefix) = entry
            .wire
            .iter()
            .find(|(z, _, _)| *z == zone)
            .ok_or_else(|| Error::UnknownCommand { command: name.to_string(), zone })?;
        Ok(ResolvedCommand { command, response_prefix: *response_prefix, args: entry.args })
    }

    /// Command names, optionally filtered by name prefix and zone.
    pub fn get_command_names(&self, prefix: Option<&str>, zone: Option<Zone>) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .commands
            .values()
            .filter(|entry| prefix.map_or(true, |p| entry.name.starts_with(p)))
            .filter(|entry| zone.map_or(true, |z| entry.wire.iter().any(|(wz, _, _)| *wz == z)))
            .map(|entry| entry.name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Registered response entries whose map belongs to a family.
    pub fn get_maps(&self, kind: MapKind) -> Vec<ResponseEntry> {
        self.responses.iter().filter(|(_, map, _)| map.kind() == kind).copied().collect()
    }

    /// All registered response prefixes (diagnostics).
    pub fn response_prefixes(&self) -> Vec<&'static str> {
        self.responses.iter().map(|(prefix, _, _)| *prefix).collect()
    }
}

pub static REGISTRY: LazyLock<PropertyRegistry> = LazyLock::new(PropertyRegistry::build);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let (prefix, _, zone) = REGISTRY.match_response("Z2MUT0").unwrap();
        assert_eq!(prefix, "Z2MUT");
        assert_eq!(zone, Zone::Z2);
        let (prefix, _, zone) = REGISTRY.match_response("MUT1").unwrap();
        assert_eq!(prefix, "MUT");
        assert_eq!(zone, Zone::Z1);
    }

    #[test]
    fn unknown_response_is_unmatched() {
        assert!(REGISTRY.match_response("QQQ123").is_none());
    }

    #[test]
    fn commands_resolve_per_zone() {
        let resolved = REGISTRY.get_command("query_power", Zone::Z2).unwrap();
        assert_eq!(resolved.command, "?AP");
        assert_eq!(resolved.response_prefix, Some("APR"));
        assert!(matches!(
            REGISTRY.get_command("query_listening_mode", Zone::Z3),
            Err(Error::UnknownCommand { .. })
        ));
        assert!(matches!(
            REGISTRY.get_command("no_such_command", Zone::Z1),
            Err(Error::UnknownCommand { .. })
        ));
    }

    #[test]
    fn set_commands_carry_arg_maps() {
        let resolved = REGISTRY.get_command("set_volume_level", Zone::Z1).unwrap();
        assert!(resolved.args.is_some());
        let resolved = REGISTRY.get_command("volume_up", Zone::Z1).unwrap();
        assert!(resolved.args.is_none());
    }

    #[test]
    fn map_kind_index_is_populated() {
        assert!(!REGISTRY.get_maps(MapKind::Bool).is_empty());
        assert!(!REGISTRY.get_maps(MapKind::Dict).is_empty());
        assert!(!REGISTRY.get_maps(MapKind::Compound).is_empty());
    }

    #[test]
    fn query_command_names_filter() {
        let names = REGISTRY.get_command_names(Some("query_"), Some(Zone::Hdz));
        assert!(names.contains(&"query_power"));
        assert!(!names.contains(&"query_listening_mode"));
    }
}
