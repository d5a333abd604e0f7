//! # partyping-core
//!
//! Types and pure logic shared by every partyping crate:
//!
//! - [`Envelope`]: the typed wrapper around each stream frame
//! - [`LogLine`]: a decoded pipe-delimited chat record
//! - [`Classifier`]: maps log lines to party [`Notification`]s
//! - [`NotificationSink`]: the async trait every delivery backend implements
//! - [`BridgeConfig`]: configuration, loaded once at startup

pub mod classifier;
pub mod config;
pub mod envelope;
pub mod error;
pub mod log_line;
pub mod notification;

pub use classifier::{camel_case_spaced, Classifier, NotifyToggles};
pub use config::{
    BridgeConfig, LogConfig, PushoverConfig, ReconnectConfig, ServerConfig, SessionConfig,
};
pub use envelope::Envelope;
pub use error::{ConfigError, DecodeError, LineError, NotifyError};
pub use log_line::{read_log_line, LogLine};
pub use notification::{LogSink, Notification, NotificationSink};
