//! Per-frame pipeline: decode → classify → deliver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use partyping_core::envelope::Envelope;
use partyping_core::error::DecodeError;
use partyping_core::log_line::read_log_line;
use partyping_core::{Classifier, Notification, NotificationSink};
use tracing::{debug, warn};

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a `"Chat"` envelope.
    Skipped,
    /// A chat payload that is not a usable log record.
    NoEvent,
    /// A log record that matched no notification rule.
    Unmatched,
    Delivered(Notification),
    /// The sink reported an error; the notification is dropped.
    DeliveryFailed(Notification),
}

/// Counters shared between the receive task and observers.
#[derive(Debug, Default)]
pub struct SessionStats {
    frames: AtomicU64,
    chat_lines: AtomicU64,
    log_lines: AtomicU64,
    notifications_sent: AtomicU64,
    delivery_failures: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub chat_lines: u64,
    pub log_lines: u64,
    pub notifications_sent: u64,
    pub delivery_failures: u64,
}

impl SessionStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            chat_lines: self.chat_lines.load(Ordering::Relaxed),
            log_lines: self.log_lines.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Runs every inbound frame through the decoder, classifier and sink.
///
/// Frames are processed one at a time; `dispatch` returns only after the
/// sink call (if any) has finished.
pub struct FrameDispatcher {
    classifier: Classifier,
    sink: Arc<dyn NotificationSink>,
    stats: Arc<SessionStats>,
}

impl FrameDispatcher {
    pub fn new(classifier: Classifier, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            classifier,
            sink,
            stats: Arc::new(SessionStats::default()),
        }
    }

    /// Shared handle to the counters.
    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Process one raw frame.
    ///
    /// A [`DecodeError`] means the frame is not a valid envelope; the caller
    /// ends the session. Every other problem is logged and absorbed.
    pub async fn dispatch(&self, frame: &[u8]) -> Result<DispatchOutcome, DecodeError> {
        SessionStats::bump(&self.stats.frames);

        let payload = match Envelope::decode(frame)? {
            Envelope::Chat(payload) => payload,
            Envelope::Other { msgtype } => {
                debug!(%msgtype, "ignoring non-chat frame");
                return Ok(DispatchOutcome::Skipped);
            }
        };
        SessionStats::bump(&self.stats.chat_lines);

        let Some(log_line) = read_log_line(&payload) else {
            return Ok(DispatchOutcome::NoEvent);
        };
        SessionStats::bump(&self.stats.log_lines);

        let Some(notification) = self.classifier.classify(&log_line) else {
            return Ok(DispatchOutcome::Unmatched);
        };

        match self.sink.deliver(&notification).await {
            Ok(()) => {
                SessionStats::bump(&self.stats.notifications_sent);
                Ok(DispatchOutcome::Delivered(notification))
            }
            Err(e) => {
                warn!(
                    sink = self.sink.name(),
                    title = %notification.title,
                    error = %e,
                    "failed to deliver notification"
                );
                SessionStats::bump(&self.stats.delivery_failures);
                Ok(DispatchOutcome::DeliveryFailed(notification))
            }
        }
    }
}
