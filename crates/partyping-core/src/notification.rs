//! Outbound alerts and the sink abstraction that delivers them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::NotifyError;

/// One outbound alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Push service sound name, e.g. `"gamelan"` or `"none"`.
    pub sound: String,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        sound: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            sound: sound.into(),
        }
    }
}

/// Delivers notifications to their destination.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the sink is shared with the
/// session's receive task behind an `Arc`.
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    /// Deliver a single notification. Errors are reported, never retried.
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}

/// A sink that only logs what it would have sent.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            title = %notification.title,
            message = %notification.message,
            sound = %notification.sound,
            "dry run: notification not sent"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_sink_always_succeeds() {
        let sink = LogSink;
        let n = Notification::new("t", "m", "none");
        assert!(sink.deliver(&n).await.is_ok());
        assert_eq!(sink.name(), "log");
    }
}
