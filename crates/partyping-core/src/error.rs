//! Error types for the partyping decode and delivery pipeline.

use thiserror::Error;

/// Errors that can occur while decoding a single inbound frame.
///
/// Any of these ends the receive loop of the session that produced the frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Envelope is not a JSON object (got {got})")]
    NotAnObject { got: &'static str },

    #[error("Chat envelope payload is not a string (got {got})")]
    ChatPayloadNotString { got: &'static str },
}

/// Reasons a chat payload does not produce a [`LogLine`](crate::LogLine).
///
/// None of these are fatal; the frame is treated as "no event".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("Unrecognized marker field '{marker}'")]
    UnrecognizedMarker { marker: String },

    #[error("Expected at least {expected} fields, got {got}")]
    MissingFields { expected: usize, got: usize },

    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },
}

impl LineError {
    /// Returns `true` for lines that are simply not log records we handle,
    /// as opposed to records that looked right but failed to parse.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Self::UnrecognizedMarker { .. })
    }
}

/// Errors from a notification sink. Never retried.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Notification rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Errors from loading or validating a [`BridgeConfig`](crate::BridgeConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
