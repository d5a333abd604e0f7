//! Opt-in bounded reconnect around [`StreamSession`].
//!
//! With `max_retries = 0` this is a single dial and a single session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use partyping_core::config::ReconnectConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::FrameDispatcher;
use crate::error::SessionError;
use crate::session::{SessionOutcome, StreamSession};

/// Exponential backoff, no jitter.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Minimum session uptime that resets the attempt count.
    pub stable_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(c: &ReconnectConfig) -> Self {
        Self {
            max_retries: c.max_retries,
            initial_backoff: Duration::from_millis(c.initial_backoff_ms),
            max_backoff: Duration::from_millis(c.max_backoff_ms),
            multiplier: c.multiplier,
            stable_after: Duration::from_millis(c.stable_after_ms),
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Returns the delay before the `attempt`-th retry (1-based).
    /// Returns `None` if `attempt` exceeds `max_retries`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        let base_ms = self.initial_backoff.as_millis() as f64
            * self.multiplier.powi((attempt - 1) as i32);
        let capped = base_ms.min(self.max_backoff.as_millis() as f64);
        Some(Duration::from_millis(capped as u64))
    }
}

/// Dial and run sessions until shutdown, a clean close, or the retry budget
/// runs out.
///
/// A session that stayed up for `policy.stable_after` resets the attempt
/// count; a shorter one counts as a failed attempt. Once retries are
/// exhausted the last session outcome, or the last dial error, is returned.
pub async fn run_with_reconnect(
    url: &str,
    dispatcher: Arc<FrameDispatcher>,
    shutdown: CancellationToken,
    grace: Duration,
    policy: &ReconnectPolicy,
) -> Result<SessionOutcome, SessionError> {
    let mut attempt = 0u32;

    loop {
        if shutdown.is_cancelled() {
            return Ok(SessionOutcome::Interrupted);
        }

        let outcome = tokio::select! {
            connected = StreamSession::connect(url) => connected,
            _ = shutdown.cancelled() => return Ok(SessionOutcome::Interrupted),
        };

        match outcome {
            Ok(session) => {
                let started = Instant::now();
                let outcome = session
                    .run(Arc::clone(&dispatcher), shutdown.clone(), grace)
                    .await;
                if outcome.is_shutdown() {
                    return Ok(outcome);
                }
                if started.elapsed() >= policy.stable_after {
                    attempt = 0;
                }

                attempt += 1;
                let Some(delay) = policy.next_delay(attempt) else {
                    return Ok(outcome);
                };
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    ?outcome,
                    "session ended, reconnecting"
                );
                if !sleep_unless_shutdown(delay, &shutdown).await {
                    return Ok(SessionOutcome::Interrupted);
                }
            }
            Err(e) => {
                attempt += 1;
                let Some(delay) = policy.next_delay(attempt) else {
                    return Err(e);
                };
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "connect failed, retrying"
                );
                if !sleep_unless_shutdown(delay, &shutdown).await {
                    return Ok(SessionOutcome::Interrupted);
                }
                info!(url, attempt, "reconnecting");
            }
        }
    }
}

/// Sleep for `delay`. Returns `false` if shutdown fired first.
async fn sleep_unless_shutdown(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.cancelled() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            stable_after: Duration::from_secs(10),
        }
    }

    #[test]
    fn exponential_delays_with_cap() {
        let p = policy(5);
        assert_eq!(p.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(p.next_delay(2), Some(Duration::from_millis(200)));
        assert_eq!(p.next_delay(3), Some(Duration::from_millis(400)));
        assert_eq!(p.next_delay(4), Some(Duration::from_millis(500)));
        assert_eq!(p.next_delay(5), Some(Duration::from_millis(500)));
        assert!(p.next_delay(6).is_none());
    }

    #[test]
    fn disabled_policy_never_retries() {
        assert!(ReconnectPolicy::disabled().next_delay(1).is_none());
        assert!(ReconnectPolicy::default().next_delay(1).is_none());
    }

    #[test]
    fn built_from_config() {
        let p = ReconnectPolicy::from(&ReconnectConfig {
            max_retries: 2,
            initial_backoff_ms: 50,
            max_backoff_ms: 60,
            multiplier: 3.0,
            stable_after_ms: 1_500,
        });
        assert_eq!(p.stable_after, Duration::from_millis(1_500));
        assert_eq!(p.next_delay(1), Some(Duration::from_millis(50)));
        assert_eq!(p.next_delay(2), Some(Duration::from_millis(60)));
        assert!(p.next_delay(3).is_none());
    }
}
