//! Pushover HTTP client backed by `reqwest`.
//!
//! One POST per notification, no retry. Non-2xx responses are reported as
//! [`NotifyError::Rejected`].

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::time::Duration;

use partyping_core::config::PushoverConfig;
use partyping_core::error::NotifyError;
use partyping_core::notification::{Notification, NotificationSink};

/// Longest response body kept in a rejection error.
const MAX_ERROR_BODY: usize = 512;

/// JSON body of a Pushover message request.
#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    token: &'a str,
    user: &'a str,
    title: &'a str,
    message: &'a str,
    sound: &'a str,
}

/// Pushover notification sink.
pub struct PushoverClient {
    endpoint: String,
    app_token: String,
    user_key: String,
    http: reqwest::Client,
}

impl PushoverClient {
    /// Build a client from the `[pushover]` config section.
    pub fn new(config: &PushoverConfig) -> Result<Self, NotifyError> {
        Self::with_timeout(
            &config.endpoint,
            &config.app_token,
            &config.user_key,
            config.timeout(),
        )
    }

    /// Build a client for an explicit endpoint.
    pub fn with_timeout(
        endpoint: impl Into<String>,
        app_token: impl Into<String>,
        user_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("partyping/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            app_token: app_token.into(),
            user_key: user_key.into(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn encode(&self, notification: &Notification) -> Result<Vec<u8>, NotifyError> {
        let body = MessageRequest {
            token: &self.app_token,
            user: &self.user_key,
            title: &notification.title,
            message: &notification.message,
            sound: &notification.sound,
        };
        Ok(serde_json::to_vec(&body)?)
    }
}

#[async_trait]
impl NotificationSink for PushoverClient {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = self.encode(notification)?;

        let resp = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(title = %notification.title, "sent notification");
        Ok(())
    }

    fn name(&self) -> &str {
        "pushover"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PushoverClient {
        PushoverClient::with_timeout(
            "http://127.0.0.1:9/1/messages.json",
            "app-token",
            "user-key",
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn encodes_flat_message_body() {
        let body = client()
            .encode(&Notification::new("Your Party Has Filled", "filled", "gamelan"))
            .unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "token": "app-token",
                "user": "user-key",
                "title": "Your Party Has Filled",
                "message": "filled",
                "sound": "gamelan",
            })
        );
    }

    #[test]
    fn built_from_config() {
        let cfg = PushoverConfig {
            app_token: "a".into(),
            user_key: "u".into(),
            ..Default::default()
        };
        let c = PushoverClient::new(&cfg).unwrap();
        assert_eq!(c.endpoint(), "https://api.pushover.net/1/messages.json");
        assert_eq!(c.name(), "pushover");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_http_error() {
        let err = client()
            .deliver(&Notification::new("t", "m", "none"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Http(_)), "got {err:?}");
    }
}
