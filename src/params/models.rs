//! Model-derived parameter defaults, selected by the first matching regex in
//! an ordered table.

use regex::Regex;
use serde_json::{json, Map, Value};

use super::{
    PARAM_DISABLED_LISTENING_MODES, PARAM_ENABLED_LISTENING_MODES, PARAM_EXTRA_LISTENING_MODES,
    PARAM_HDZONE_VOLUME_REQUIREMENTS, PARAM_MHL_SOURCE, PARAM_SPEAKER_SYSTEM_MODES,
    PARAM_VOLUME_STEP_ONLY, PARAM_ZONE_2_SOURCES, PARAM_ZONE_3_SOURCES,
};

/// Speaker system modes common to current models.
pub(super) fn speaker_system_modes_default() -> Value {
    json!({
        "00": "Normal / 5.2.2ch / 7.2ch",
        "01": "7.2ch SB/FW",
        "02": "Speaker B",
        "03": "Front Bi-Amp",
        "04": "Zone 2",
        "05": "HDZone",
        "07": "5.2ch",
        "08": "Front Bi-Amp",
        "09": "Speaker B",
        "10": "9.1ch FH/FW",
        "11": "7.2.2/7.2ch +SP-B",
        "12": "7.2ch Front Bi-Amp",
        "13": "7.2ch + HDZONE",
        "14": "7.1ch FH/FW + ZONE 2",
        "15": "5.2ch Bi-Amp + HDZONE",
        "16": "5.2ch + ZONE 2+3",
        "17": "5.2ch + SP-B Bi-Amp",
        "18": "5.2ch F+Surr Bi-Amp",
        "19": "5.2ch F+C Bi-Amp",
        "20": "5.2ch C+Surr Bi-Amp",
        "21": "Multi-ZONE Music",
        "22": "7.2.2ch TMd/FW",
        "23": "7.2.2ch TMd/FH",
        "24": "5.2.4ch",
        "25": "5.2ch ZONE 2 + HDZONE",
        "26": "7.2.2/5.2.2/7.2ch",
        "27": "7.2.2c Front Bi-Amp",
        "30": "9.2.2ch TMd/FH",
        "31": "7.2.4ch SB Pre Out",
        "32": "7.2.4ch Front Pre Out",
    })
}

fn speaker_system_modes_sc_lx79() -> Value {
    json!({
        "00": "Normal (SB/FH)",
        "01": "Normal (SB/FW)",
        "02": "Speaker B",
        "03": "Front Bi-Amp",
        "04": "Zone 2",
        "10": "9.1ch FH/FW",
        "11": "7.1ch + Speaker B",
        "12": "7.1ch Front Bi-Amp",
        "13": "7.1ch + ZONE2",
        "14": "7.1ch FH/FW + ZONE 2",
        "15": "5.1ch Bi-Amp + ZONE2",
        "16": "5.1ch + ZONE 2+3",
        "17": "5.1ch + SP-B Bi-Amp",
        "18": "5.1ch F+Surr Bi-Amp",
        "19": "5.1ch F+C Bi-Amp",
        "20": "5.1ch C+Surr Bi-Amp",
        "21": "Multi-ZONE Music",
    })
}

fn disabled_listening_modes_sc_lx79() -> Value {
    let mut modes: Vec<i64> = vec![4, 11, 16, 17, 25, 28, 29, 53, 55, 59, 73];
    modes.extend(76..79);
    modes.extend(83..86);
    modes.push(102);
    modes.extend(104..107);
    modes.extend([109, 116]);
    json!(modes)
}

fn disabled_listening_modes_sc_2023() -> Value {
    let mut modes: Vec<i64> = vec![4, 11, 16, 17, 25, 28, 29];
    modes.extend(51..98);
    modes.push(102);
    modes.extend(104..107);
    modes.extend([109, 116, 152]);
    modes.extend(201..207);
    json!(modes)
}

/// Shared defaults for the SC generation: no HDZone volume requirements plus
/// the SC-LX79 speaker system table.
fn sc_family(disabled_modes: Option<Value>) -> Value {
    let mut params = json!({
        PARAM_HDZONE_VOLUME_REQUIREMENTS: [],
        PARAM_SPEAKER_SYSTEM_MODES: speaker_system_modes_sc_lx79(),
    });
    if let Some(modes) = disabled_modes {
        params[PARAM_DISABLED_LISTENING_MODES] = modes;
    }
    params
}

fn model_defaults_table() -> Vec<(&'static str, Value)> {
    let sc_lx87_zone_2 = json!([4, 6, 15, 26, 38, 53, 44, 45, 17, 5, 1, 2, 33, 46, 47, 99, 10, 13]);
    let sc_lx87_zone_3 = json!([4, 6, 15, 26, 38, 53, 44, 45, 17, 13, 5, 1, 2, 33, 46, 47, 99, 10]);

    let mut sc_lx87 = sc_family(Some(disabled_listening_modes_sc_lx79()));
    sc_lx87[PARAM_ZONE_2_SOURCES] = sc_lx87_zone_2.clone();
    sc_lx87[PARAM_ZONE_3_SOURCES] = sc_lx87_zone_3.clone();

    let mut sc_lx77 = sc_family(Some(disabled_listening_modes_sc_lx79()));
    sc_lx77[PARAM_ZONE_2_SOURCES] =
        json!([4, 6, 15, 26, 38, 53, 44, 45, 17, 5, 1, 2, 33, 46, 47, 99, 10]);
    sc_lx77[PARAM_ZONE_3_SOURCES] = sc_lx87_zone_3;

    let mut sc_lx57 = sc_family(Some(disabled_listening_modes_sc_lx79()));
    sc_lx57[PARAM_ZONE_2_SOURCES] = sc_lx87_zone_2;
    sc_lx57[PARAM_ZONE_3_SOURCES] = json!([4, 6, 15, 5, 1, 2, 33, 10, 99]);
    sc_lx57[PARAM_MHL_SOURCE] = json!(23);

    let mut sc_2023 = sc_family(Some(disabled_listening_modes_sc_2023()));
    sc_2023[PARAM_ZONE_3_SOURCES] = json!([4, 6, 15, 5, 1, 2, 33, 10, 99]);

    vec![
        (
            r"^VSX-930",
            json!({
                PARAM_EXTRA_LISTENING_MODES: {
                    "0040": ["Dolby Surround", true, true],
                    "0041": ["EXTENDED STEREO", true, true],
                    "0100": ["ADVANCED SURROUND (cyclic)", true, true],
                },
                PARAM_ENABLED_LISTENING_MODES: [5, 6, 7, 8, 9, 10, 16, 40, 41, 100, 151, 212],
            }),
        ),
        (r"^VSX-S510", json!({ PARAM_VOLUME_STEP_ONLY: true })),
        (r"^VSX-528", json!({ PARAM_VOLUME_STEP_ONLY: true })),
        (r"^SC-LX79", sc_family(Some(disabled_listening_modes_sc_lx79()))),
        (r"^SC-LX87", sc_lx87),
        (r"^SC-77", sc_family(Some(disabled_listening_modes_sc_lx79()))),
        (r"^SC-LX77", sc_lx77),
        (r"^SC-75", sc_family(Some(disabled_listening_modes_sc_lx79()))),
        (r"^SC-1523", sc_family(Some(disabled_listening_modes_sc_lx79()))),
        (r"^SC-1528", sc_family(Some(disabled_listening_modes_sc_lx79()))),
        (r"^SC-LX57", sc_lx57),
        (r"^SC-72", sc_family(Some(disabled_listening_modes_sc_lx79()))),
        (r"^SC-1323", sc_family(Some(disabled_listening_modes_sc_lx79()))),
        (r"^SC-1328", sc_family(Some(disabled_listening_modes_sc_lx79()))),
        (r"^SC-2023", sc_2023.clone()),
        (r"^SC-71", sc_family(None)),
        (r"^SC-1223", sc_2023),
        (r"^SC-1228", sc_family(None)),
        (r"^VSX-1123", sc_family(Some(disabled_listening_modes_sc_2023()))),
        (r"^VSX-1128", sc_family(None)),
        (r"^VSX-1028", sc_family(None)),
        (r"^VSX-923", sc_family(Some(disabled_listening_modes_sc_2023()))),
        (r"^VSX-45", json!({ PARAM_HDZONE_VOLUME_REQUIREMENTS: [] })),
        (r"^VSX-830", json!({ PARAM_HDZONE_VOLUME_REQUIREMENTS: [] })),
    ]
}

/// Model defaults for `model`, or `None` when no table entry matches.
/// Returns the matching pattern for logging.
pub fn model_defaults_for(model: &str) -> Option<(String, Map<String, Value>)> {
    for (pattern, params) in model_defaults_table() {
        let Ok(regex) = Regex::new(pattern) else { continue };
        if regex.is_match(model) {
            let map = match params {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            return Some((pattern.to_string(), map));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins() {
        // SC-77 must match before any later SC- pattern could
        let (pattern, _) = model_defaults_for("SC-77-S").unwrap();
        assert_eq!(pattern, r"^SC-77");
    }

    #[test]
    fn unknown_model_has_no_defaults() {
        assert!(model_defaults_for("TX-NR676").is_none());
    }

    #[test]
    fn vsx_930_extra_modes_use_wire_codes() {
        let (_, params) = model_defaults_for("VSX-930").unwrap();
        let extra = params.get(PARAM_EXTRA_LISTENING_MODES).unwrap();
        assert!(extra.get("0040").is_some());
    }
}
