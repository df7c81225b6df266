//! Error types for the Parley tracker

use thiserror::Error;

/// Result type alias for tracker operations
pub type ParleyResult<T> = Result<T, ParleyError>;

/// Errors that can occur around the conversation tracker.
///
/// None of these escape an event handler: notifier failures are logged and
/// swallowed, and decode failures are reported to the host that owns the bus.
#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Notification delivery failed: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown event kind: {0}")]
    UnknownEvent(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ParleyError {
    fn from(err: config::ConfigError) -> Self {
        ParleyError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for ParleyError {
    fn from(err: toml::de::Error) -> Self {
        ParleyError::Config(err.to_string())
    }
}
