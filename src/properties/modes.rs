//! Built-in listening mode catalogue.
//!
//! Entries are `(wire code, display name, valid for 2ch source, valid for
//! multichannel source)`. Model-specific additions come in through the
//! `extra_amp_listening_modes` parameter.

pub type ListeningModeEntry = (&'static str, &'static str, bool, bool);

pub static LISTENING_MODES: &[ListeningModeEntry] = &[
    ("0001", "STEREO", true, true),
    ("0003", "Front Stage Surround Advance", true, true),
    ("0004", "Front Stage Surround Advance Wide", true, true),
    ("0005", "AUTO SURR/STREAM DIRECT", true, true),
    ("0006", "AUTO SURROUND", true, true),
    ("0007", "DIRECT", true, true),
    ("0008", "PURE DIRECT", true, true),
    ("0009", "STEREO (direct)", true, false),
    ("0010", "STANDARD", true, false),
    ("0011", "2ch", true, false),
    ("0012", "PRO LOGIC", true, false),
    ("0013", "PRO LOGIC2 MOVIE", true, false),
    ("0014", "PRO LOGIC2 MUSIC", true, false),
    ("0015", "PRO LOGIC2 GAME", true, false),
    ("0016", "Neo:6 CINEMA", true, false),
    ("0017", "Neo:6 MUSIC", true, false),
    ("0018", "PRO LOGIC2x MOVIE", true, false),
    ("0019", "PRO LOGIC2x MUSIC", true, false),
    ("0020", "PRO LOGIC2x GAME", true, false),
    ("0021", "Multi ch", false, true),
    ("0022", "DOLBY EX", false, true),
    ("0023", "PRO LOGIC2x MOVIE (2)", false, true),
    ("0024", "PRO LOGIC2x MUSIC (2)", false, true),
    ("0025", "DTS-ES Neo", false, true),
    ("0026", "DTS-ES matrix", false, true),
    ("0027", "DTS-ES discrete", false, true),
    ("0028", "XM HD SURROUND", true, true),
    ("0029", "NEURAL SURROUND", true, true),
    ("0030", "DTS-ES 8ch discrete", false, true),
    ("0031", "PRO LOGIC2z HEIGHT", true, true),
    ("0032", "WIDE SURROUND MOVIE", true, true),
    ("0033", "WIDE SURROUND MUSIC", true, true),
    ("0034", "PRO LOGIC2z HEIGHT (2)", false, true),
    ("0035", "WIDE SURROUND MOVIE (2)", false, true),
    ("0036", "WIDE SURROUND MUSIC (2)", false, true),
    ("0037", "Neo:X CINEMA", true, true),
    ("0038", "Neo:X MUSIC", true, true),
    ("0039", "Neo:X GAME", true, true),
    ("0040", "NEURAL SURROUND+Neo:X CINEMA", true, true),
    ("0041", "NEURAL SURROUND+Neo:X MUSIC", true, true),
    ("0042", "NEURAL SURROUND+Neo:X GAME", true, true),
    ("0043", "Neo:X CINEMA (2)", false, true),
    ("0044", "Neo:X MUSIC (2)", false, true),
    ("0045", "Neo:X GAME (2)", false, true),
    ("0051", "PROLOGIC + THX CINEMA", true, true),
    ("0052", "PL2 MOVIE + THX CINEMA", true, true),
    ("0053", "Neo:6 CINEMA + THX CINEMA", true, true),
    ("0054", "PL2x MOVIE + THX CINEMA", true, true),
    ("0055", "THX SELECT2 GAMES", true, true),
    ("0056", "THX CINEMA", false, true),
    ("0057", "THX SURROUND EX", false, true),
    ("0058", "PL2x MOVIE + THX CINEMA (2)", false, true),
    ("0059", "ES Neo:6 + THX CINEMA", false, true),
    ("0060", "ES MATRIX + THX CINEMA", false, true),
    ("0061", "ES DISCRETE + THX CINEMA", false, true),
    ("0062", "THX SELECT2 CINEMA", false, true),
    ("0063", "THX SELECT2 MUSIC", false, true),
    ("0064", "THX SELECT2 GAMES (2)", false, true),
    ("0065", "THX ULTRA2 CINEMA", false, true),
    ("0066", "THX ULTRA2 MUSIC", false, true),
    ("0067", "ES 8ch DISCRETE + THX CINEMA", false, true),
    ("0068", "THX CINEMA (2)", true, false),
    ("0069", "THX MUSIC (2)", true, false),
    ("0070", "THX GAMES (2)", true, false),
    ("0071", "PL2 MUSIC + THX MUSIC", true, true),
    ("0072", "PL2x MUSIC + THX MUSIC", true, true),
    ("0073", "Neo:6 MUSIC + THX MUSIC", true, true),
    ("0074", "PL2 GAME + THX GAMES", true, true),
    ("0075", "PL2x GAME + THX GAMES", true, true),
    ("0076", "THX ULTRA2 GAMES", true, true),
    ("0077", "PROLOGIC + THX MUSIC", true, true),
    ("0078", "PROLOGIC + THX GAMES", true, true),
    ("0079", "THX ULTRA2 GAMES (2)", false, true),
    ("0080", "THX MUSIC", false, true),
    ("0081", "THX GAMES", false, true),
    ("0082", "PL2x MUSIC + THX MUSIC (2)", false, true),
    ("0083", "EX + THX GAMES", false, true),
    ("0084", "Neo:6 + THX MUSIC", false, true),
    ("0085", "Neo:6 + THX GAMES", false, true),
    ("0086", "ES MATRIX + THX MUSIC", false, true),
    ("0087", "ES MATRIX + THX GAMES", false, true),
    ("0088", "ES DISCRETE + THX MUSIC", false, true),
    ("0089", "ES DISCRETE + THX GAMES", false, true),
    ("0090", "ES 8CH DISCRETE + THX MUSIC", false, true),
    ("0091", "ES 8CH DISCRETE + THX GAMES", false, true),
    ("0092", "PL2z HEIGHT + THX CINEMA", true, false),
    ("0093", "PL2z HEIGHT + THX MUSIC", true, false),
    ("0094", "PL2z HEIGHT + THX GAMES", true, false),
    ("0095", "PL2z HEIGHT + THX CINEMA (2)", false, true),
    ("0096", "PL2z HEIGHT + THX MUSIC (2)", false, true),
    ("0097", "PL2z HEIGHT + THX GAMES (2)", false, true),
    ("0101", "ACTION", true, true),
    ("0102", "SCI-FI", true, true),
    ("0103", "DRAMA", true, true),
    ("0104", "ENTERTAINMENT SHOW", true, true),
    ("0105", "MONO FILM", true, true),
    ("0106", "EXPANDED THEATER", true, true),
    ("0107", "CLASSICAL", true, true),
    ("0109", "UNPLUGGED", true, true),
    ("0110", "ROCK/POP", true, true),
    ("0112", "EXTENDED STEREO", true, true),
    ("0113", "PHONES SURROUND", true, true),
    ("0116", "TV SURROUND", true, true),
    ("0117", "SPORTS", true, true),
    ("0118", "ADVANCED GAME", true, true),
    ("0151", "Auto Level Control", true, true),
    ("0152", "OPTIMUM SURROUND", true, true),
    ("0153", "RETRIEVER AIR", true, true),
    ("0200", "ECO MODE", true, true),
    ("0201", "Neo:X CINEMA + THX CINEMA", true, false),
    ("0202", "Neo:X MUSIC + THX MUSIC", true, false),
    ("0203", "Neo:X GAME + THX GAMES", true, false),
    ("0204", "Neo:X CINEMA + THX CINEMA (2)", false, true),
    ("0205", "Neo:X MUSIC + THX MUSIC (2)", false, true),
    ("0206", "Neo:X GAME + THX GAMES (2)", false, true),
    ("0212", "ECO MODE 1", true, true),
    ("0213", "ECO MODE 2", true, true),
];

/// Sources that support media controls, and the control mode they map to.
pub static MEDIA_CONTROL_SOURCES: &[(i64, &str)] = &[
    (26, "NETWORK"),
    (38, "NETWORK"),
    (44, "NETWORK"),
    (2, "TUNER"),
    (13, "ADAPTERPORT"),
    (41, "NETWORK"),
    (53, "NETWORK"),
    (17, "IPOD"),
];

/// Media control actions per control mode, mapped to registry command names.
pub static MEDIA_CONTROL_COMMANDS: &[(&str, &[(&str, &str)])] = &[
    (
        "NETWORK",
        &[
            ("play", "operation_network_play"),
            ("pause", "operation_network_pause"),
            ("stop", "operation_network_stop"),
            ("ff", "operation_network_fastforward"),
            ("rw", "operation_network_rewind"),
            ("next", "operation_network_next"),
            ("previous", "operation_network_previous"),
            ("repeat", "operation_network_repeat"),
            ("shuffle", "operation_network_random"),
        ],
    ),
    (
        "IPOD",
        &[
            ("play", "operation_ipod_play"),
            ("pause", "operation_ipod_pause"),
            ("stop", "operation_ipod_stop"),
            ("ff", "operation_ipod_fastforward"),
            ("rw", "operation_ipod_rewind"),
            ("next", "operation_ipod_next"),
            ("previous", "operation_ipod_previous"),
            ("repeat", "operation_ipod_repeat"),
            ("shuffle", "operation_ipod_shuffle"),
        ],
    ),
    (
        "TUNER",
        &[
            ("ff", "increase_tuner_frequency"),
            ("rw", "decrease_tuner_frequency"),
            ("next", "increase_tuner_preset"),
            ("previous", "decrease_tuner_preset"),
        ],
    ),
    (
        "ADAPTERPORT",
        &[
            ("play", "operation_adapterport_play"),
            ("pause", "operation_adapterport_pause"),
            ("stop", "operation_adapterport_stop"),
            ("previous", "operation_adapterport_previous"),
            ("next", "operation_adapterport_next"),
            ("rw", "operation_adapterport_rewind"),
            ("ff", "operation_adapterport_fastforward"),
            ("repeat", "operation_adapterport_repeat"),
            ("shuffle", "operation_adapterport_random"),
        ],
    ),
    (
        "MHL",
        &[
            ("play", "operation_mhl_play"),
            ("pause", "operation_mhl_pause"),
            ("stop", "operation_mhl_stop"),
            ("record", "operation_mhl_record"),
            ("rw", "operation_mhl_rewind"),
            ("ff", "operation_mhl_fastforward"),
            ("eject", "operation_mhl_eject"),
            ("next", "operation_mhl_next"),
            ("previous", "operation_mhl_previous"),
        ],
    ),
];

/// Actions supported by a media control mode.
pub fn media_control_actions(mode: &str) -> Option<&'static [(&'static str, &'static str)]> {
    MEDIA_CONTROL_COMMANDS.iter().find(|(name, _)| *name == mode).map(|(_, actions)| *actions)
}

/// Media control mode for a source ID, if any.
pub fn media_control_mode_for_source(source_id: i64) -> Option<&'static str> {
    MEDIA_CONTROL_SOURCES.iter().find(|(id, _)| *id == source_id).map(|(_, mode)| *mode)
}
