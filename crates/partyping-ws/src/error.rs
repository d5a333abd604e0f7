//! Session-level error types.

use thiserror::Error;

/// Errors that prevent a stream session from running.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid stream URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("WebSocket connection failed: {url}: {reason}")]
    Connect { url: String, reason: String },
}
