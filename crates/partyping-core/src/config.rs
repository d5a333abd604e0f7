//! Bridge configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.
//! The CLI layers environment variables and flags on top of the file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::classifier::NotifyToggles;
use crate::error::ConfigError;

/// Default ACT / IINACT WebSocket server address.
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:10501";
/// Default Pushover message endpoint.
pub const DEFAULT_PUSHOVER_ENDPOINT: &str = "https://api.pushover.net/1/messages.json";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub pushover: PushoverConfig,
    pub notify: NotifyToggles,
    pub session: SessionConfig,
    pub reconnect: ReconnectConfig,
    pub log: LogConfig,
}

/// Event stream server connection target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` of the WebSocket server
    pub address: String,
    /// Path of the stream endpoint on that server
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_SERVER_ADDRESS.into(),
            path: "MiniParse".into(),
        }
    }
}

impl ServerConfig {
    /// The `ws://` URL to dial.
    pub fn ws_url(&self) -> String {
        format!(
            "ws://{}/{}",
            self.address,
            self.path.trim_start_matches('/')
        )
    }
}

/// Pushover delivery credentials and endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushoverConfig {
    pub app_token: String,
    pub user_key: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for PushoverConfig {
    fn default() -> Self {
        Self {
            app_token: String::new(),
            user_key: String::new(),
            endpoint: DEFAULT_PUSHOVER_ENDPOINT.into(),
            timeout_secs: 10,
        }
    }
}

impl PushoverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Credentials stay out of debug logs.
impl std::fmt::Debug for PushoverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushoverConfig")
            .field("app_token", &redact(&self.app_token))
            .field("user_key", &redact(&self.user_key))
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long to wait for the server to close after we send a close frame.
    pub shutdown_grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: 1_000,
        }
    }
}

impl SessionConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Reconnect behaviour after a session ends on its own.
///
/// `max_retries = 0` keeps the single-attempt model: one dial, one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    /// A session must stay up this long before the retry count starts over.
    pub stable_after_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
            stable_after_ms: 10_000,
        }
    }
}

/// `[log]` section. `RUST_LOG`, when set, wins over all of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Extra `target = level` pairs, e.g. `partyping-ws = "debug"`.
    pub targets: BTreeMap<String, String>,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            targets: BTreeMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// `EnvFilter` directive string. Crate names are accepted with dashes.
    pub fn filter_directives(&self) -> String {
        std::iter::once(self.level.clone())
            .chain(
                self.targets
                    .iter()
                    .map(|(target, level)| format!("{}={level}", target.replace('-', "_"))),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl BridgeConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check the config is usable.
    ///
    /// Pushover credentials are only required when notifications will
    /// actually be sent (`require_credentials`).
    pub fn validate(&self, require_credentials: bool) -> Result<(), ConfigError> {
        if self.server.address.trim().is_empty() {
            return Err(ConfigError::invalid("server.address", "must not be empty"));
        }
        if self.server.address.contains('/') {
            return Err(ConfigError::invalid(
                "server.address",
                format!("expected host:port, got '{}'", self.server.address),
            ));
        }

        let endpoint = &self.pushover.endpoint;
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigError::invalid(
                "pushover.endpoint",
                format!("expected an http(s) URL, got '{endpoint}'"),
            ));
        }
        if self.pushover.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "pushover.timeout_secs",
                "must be greater than zero",
            ));
        }
        if require_credentials {
            if self.pushover.app_token.is_empty() {
                return Err(ConfigError::invalid("pushover.app_token", "is required"));
            }
            if self.pushover.user_key.is_empty() {
                return Err(ConfigError::invalid("pushover.user_key", "is required"));
            }
        }

        let r = &self.reconnect;
        if r.max_retries > 0 {
            if r.multiplier < 1.0 {
                return Err(ConfigError::invalid(
                    "reconnect.multiplier",
                    format!("must be at least 1.0, got {}", r.multiplier),
                ));
            }
            if r.initial_backoff_ms > r.max_backoff_ms {
                return Err(ConfigError::invalid(
                    "reconnect.initial_backoff_ms",
                    "must not exceed reconnect.max_backoff_ms",
                ));
            }
        }
        Ok(())
    }
}
