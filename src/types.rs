//! Core protocol types: zones, tuner bands and session defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default AVR API port. Port 23 is also in use on some units; keepalive
/// cadence differs by port but the client is port-agnostic.
pub const DEFAULT_PORT: u16 = 8102;

/// Default session timeout in seconds, governing both connection
/// establishment and per-request waits.
pub const DEFAULT_TIMEOUT: f64 = 2.0;

/// Default debounced refresh interval in seconds.
pub const DEFAULT_SCAN_INTERVAL: f64 = 60.0;

/// Source ID of the internal tuner.
pub const SOURCE_TUNER: i64 = 2;

/// A logically independent output of the receiver.
///
/// `All` is a sentinel for "property is not per-zone" and is never used as a
/// map key that carries real state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Zone {
    #[serde(rename = "ALL")]
    All,
    #[serde(rename = "1")]
    Z1,
    #[serde(rename = "2")]
    Z2,
    #[serde(rename = "3")]
    Z3,
    #[serde(rename = "Z")]
    Hdz,
}

impl Zone {
    /// The real zones, in discovery order.
    pub const REAL: [Zone; 4] = [Zone::Z1, Zone::Z2, Zone::Z3, Zone::Hdz];

    /// Wire identifier used in parameter keys and zone dicts.
    pub fn id(&self) -> &'static str {
        match self {
            Zone::All => "ALL",
            Zone::Z1 => "1",
            Zone::Z2 => "2",
            Zone::Z3 => "3",
            Zone::Hdz => "Z",
        }
    }

    /// Human-readable zone name.
    pub fn full_name(&self) -> &'static str {
        match self {
            Zone::All => "All Zones",
            Zone::Z1 => "Main Zone",
            Zone::Z2 => "Zone 2",
            Zone::Z3 => "Zone 3",
            Zone::Hdz => "HDZone",
        }
    }

    /// Parse a zone from its wire identifier.
    pub fn from_id(id: &str) -> Option<Zone> {
        match id {
            "ALL" => Some(Zone::All),
            "1" => Some(Zone::Z1),
            "2" => Some(Zone::Z2),
            "3" => Some(Zone::Z3),
            "Z" => Some(Zone::Hdz),
            _ => None,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_name())
    }
}

/// Valid tuner frequency bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TunerBand {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "FM")]
    Fm,
}

impl fmt::Display for TunerBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TunerBand::Am => "AM",
            TunerBand::Fm => "FM",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_ids_round_trip() {
        for zone in Zone::REAL.into_iter().chain([Zone::All]) {
            assert_eq!(Zone::from_id(zone.id()), Some(zone));
        }
        assert_eq!(Zone::from_id("4"), None);
    }

    #[test]
    fn all_is_not_a_real_zone() {
        assert!(!Zone::REAL.contains(&Zone::All));
    }
}
