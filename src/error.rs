//! Error taxonomy for the AVR client.
//!
//! A single sum type covers connection, command and decoding errors.
//! `Error::Unavailable` always propagates, even when a caller has asked for
//! errors to be ignored.

use thiserror::Error;

use crate::types::Zone;

#[derive(Debug, Error)]
pub enum Error {
    // Connection errors
    #[error("AVR is already connected")]
    AlreadyConnected,
    #[error("AVR is already connecting")]
    AlreadyConnecting,
    #[error("AVR is already disconnecting")]
    AlreadyDisconnecting,
    #[error("unable to connect to AVR: connection timed out")]
    ConnectTimeout,
    #[error("unable to connect to AVR: {0}")]
    ConnectFailed(String),
    #[error("error disconnecting from AVR: {0}")]
    DisconnectFailed(String),
    #[error("AVR connection is not available")]
    Unavailable,

    // Command errors
    #[error("unknown AVR command {command} for zone {zone}")]
    UnknownCommand { command: String, zone: Zone },
    #[error("unknown command {0}")]
    UnknownLocalCommand(String),
    #[error("AVR command {0} timed out")]
    ResponseTimeout(String),
    #[error("AVR command {command} returned error: {}", response_error_text(.response))]
    CommandResponse { command: String, response: String },
    #[error("AVR command {command} is unavailable: {reason}")]
    CommandUnavailable { command: String, reason: String },
    #[error("command {command} error: {reason}")]
    LocalCommand { command: String, reason: String },

    // Decoding errors
    #[error("exception decoding response: {response}: {reason}")]
    ResponseDecode { response: String, reason: String },
}

impl Error {
    pub fn local(command: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::LocalCommand { command: command.into(), reason: reason.into() }
    }

    pub fn unavailable_command(command: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::CommandUnavailable { command: command.into(), reason: reason.into() }
    }
}

/// Human messages for wire-level error and busy responses.
pub fn response_error_text(response: &str) -> &str {
    match response {
        "B00" => "AVR temporarily busy",
        "E02" => "command currently unavailable",
        "E03" => "unsupported command",
        "E04" => "unknown command",
        "E06" => "invalid parameter",
        other => other,
    }
}

/// Messages for local tuner frequency failures.
pub mod reason {
    pub const FREQ_STEP_UNKNOWN: &str =
        "unknown AM tuner frequency step, parameter 'am_frequency_step' required";
    pub const FREQ_STEP_MAX_EXCEEDED: &str = "maximum tuner frequency step count exceeded";
    pub const TUNER_UNAVAILABLE: &str = "AVR tuner is unavailable";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_error_messages() {
        let err = Error::CommandResponse { command: "set_volume_level".into(), response: "E04".into() };
        assert_eq!(
            err.to_string(),
            "AVR command set_volume_level returned error: unknown command"
        );
        let err = Error::CommandResponse { command: "turn_on".into(), response: "E99".into() };
        assert!(err.to_string().ends_with("E99"));
    }

    #[test]
    fn unknown_command_names_zone() {
        let err = Error::UnknownCommand { command: "bogus".into(), zone: Zone::Z2 };
        assert_eq!(err.to_string(), "unknown AVR command bogus for zone Zone 2");
    }
}
