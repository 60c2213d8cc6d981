//! Error types for Kino Collector

use thiserror::Error;

/// Result type alias for collector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Collector error types
#[derive(Error, Debug)]
pub enum Error {
    // Setup errors
    #[error("Player API not available: {engine}")]
    PlayerApiMissing { engine: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Event errors
    #[error("Unknown event name: {0}")]
    UnknownEvent(String),

    #[error("Unknown state name: {0}")]
    UnknownState(String),

    #[error("Invalid replay log: {0}")]
    InvalidReplay(String),

    // Backend errors
    #[error("License denied: {0}")]
    LicenseDenied(String),

    #[error("Backend rejected request with status {status}")]
    BackendStatus { status: u16 },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),

    // Internal errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a missing player API error
    pub fn player_api_missing(engine: impl Into<String>) -> Self {
        Error::PlayerApiMissing {
            engine: engine.into(),
        }
    }

    /// Returns true if the session can keep tracking after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnknownEvent(_)
                | Error::UnknownState(_)
                | Error::BackendStatus { .. }
                | Error::Transport(_)
        )
    }

    /// Returns the error code used in logs and samples
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::PlayerApiMissing { .. } => "PLAYER_API_MISSING",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::UnknownEvent(_) => "UNKNOWN_EVENT",
            Error::UnknownState(_) => "UNKNOWN_STATE",
            Error::InvalidReplay(_) => "INVALID_REPLAY",
            Error::LicenseDenied(_) => "LICENSE_DENIED",
            Error::BackendStatus { .. } => "BACKEND_STATUS",
            Error::Transport(_) => "NETWORK",
            Error::Url(_) => "INVALID_URL",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_api_missing_is_fatal() {
        let err = Error::player_api_missing("bitmovin");
        assert!(!err.is_recoverable());
        assert_eq!(err.error_code(), "PLAYER_API_MISSING");
        assert_eq!(err.to_string(), "Player API not available: bitmovin");
    }

    #[test]
    fn test_unknown_event_is_recoverable() {
        let err = Error::UnknownEvent("SPIN".to_string());
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), "UNKNOWN_EVENT");
    }
}
