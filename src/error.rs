//! Error types for the QA bridge.

use std::time::Duration;

/// Top-level error type for the bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Bot transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Channel {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },

    #[error("Failed to send reply on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid event payload: {0}")]
    InvalidEvent(String),
}

/// Failure modes of a single QA backend exchange.
///
/// These never leave the QA client; callers only see the safe display
/// strings in [`crate::qa`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("QA backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("QA backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("QA transport failure: {0}")]
    Transport(String),
}

/// Result type alias for the bridge.
pub type Result<T> = std::result::Result<T, Error>;
