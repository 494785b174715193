//! Session, transport and configuration error types.

use derive_more::{Display, Error};
use gridduel_game::GameConfigError;
use tracing::instrument;

/// Failure reported by a transport endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TransportError {
    /// The requested local identifier is already taken.
    #[display("Identifier {} is unavailable", _0)]
    IdentifierUnavailable(#[error(not(source))] String),

    /// No endpoint is listening under the remote identifier.
    #[display("Remote {} is unavailable", _0)]
    RemoteUnavailable(#[error(not(source))] String),

    /// Any other connectivity failure.
    #[display("Transport failure: {}", _0)]
    GenericFailure(#[error(not(source))] String),
}

/// Why a session left (or never reached) the connected state.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SessionError {
    /// Invalid board geometry or room code.
    #[display("Invalid configuration: {}", _0)]
    Configuration(#[error(not(source))] String),

    /// Every room code tried was already in use.
    #[display("Could not allocate a room after {} attempts", attempts)]
    IdentifierCollision {
        /// Codes tried before giving up.
        attempts: u32,
    },

    /// The host did not answer before the connect deadline.
    #[display("Timed out connecting to room")]
    ConnectTimeout,

    /// Nobody is hosting the requested room.
    #[display("Room not found")]
    RemoteUnavailable,

    /// The opponent closed the connection.
    #[display("Opponent disconnected")]
    PeerDisconnected,

    /// Generic connectivity failure.
    #[display("Connection failed: {}", _0)]
    TransportFailure(#[error(not(source))] String),
}

impl SessionError {
    /// Human-readable reason suitable for a status line.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Configuration(reason) => format!("Check your game settings: {reason}"),
            SessionError::IdentifierCollision { .. } => {
                "Couldn't create a room right now. Please try again.".to_string()
            }
            SessionError::ConnectTimeout => {
                "Couldn't reach that room. Check the code and try again.".to_string()
            }
            SessionError::RemoteUnavailable => "Room not found.".to_string(),
            SessionError::PeerDisconnected => "Your opponent left the game.".to_string(),
            SessionError::TransportFailure(_) => {
                "Connection problem. Please try again.".to_string()
            }
        }
    }

    /// True if retrying the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SessionError::Configuration(_))
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::RemoteUnavailable(_) => SessionError::RemoteUnavailable,
            other => SessionError::TransportFailure(other.to_string()),
        }
    }
}

impl From<GameConfigError> for SessionError {
    fn from(err: GameConfigError) -> Self {
        SessionError::Configuration(err.to_string())
    }
}

/// Configuration or preferences error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<GameConfigError> for ConfigError {
    #[track_caller]
    fn from(err: GameConfigError) -> Self {
        Self::new(format!("Invalid board: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_unavailable_maps_to_room_not_found() {
        let err: SessionError = TransportError::RemoteUnavailable("gridduel-v2-123".into()).into();
        assert_eq!(err, SessionError::RemoteUnavailable);
        assert_eq!(err.user_message(), "Room not found.");
    }

    #[test]
    fn test_only_configuration_errors_are_final() {
        assert!(SessionError::ConnectTimeout.is_retryable());
        assert!(SessionError::IdentifierCollision { attempts: 5 }.is_retryable());
        assert!(SessionError::PeerDisconnected.is_retryable());
        assert!(!SessionError::Configuration("zero attempts".into()).is_retryable());
    }

    #[test]
    fn test_config_error_records_location() {
        let err = ConfigError::new("bad grid");
        assert!(err.file.ends_with("error.rs"));
        assert!(err.to_string().starts_with("Config error: bad grid"));
    }
}
