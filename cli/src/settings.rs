//! Config layering: defaults ← TOML file ← environment ← flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use partyping_core::BridgeConfig;

/// Options shared by every command that needs a [`BridgeConfig`].
#[derive(Debug, Default, Args)]
pub struct ConfigArgs {
    /// Path to a TOML config file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// ACT / IINACT websocket server address (host:port)
    #[arg(long, value_name = "HOST:PORT")]
    pub addr: Option<String>,

    /// Pushover user key
    #[arg(long, env = "PARTYPING_USER_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Pushover application token
    #[arg(long, env = "PARTYPING_APP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Notify when the party is filled [default: true]
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub notify_fill: Option<bool>,

    /// Notify when the party is disbanded [default: false]
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub notify_disband: Option<bool>,

    /// Notify when someone joins the party [default: false]
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub notify_join: Option<bool>,

    /// Notify when someone leaves the party [default: false]
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub notify_leave: Option<bool>,

    /// Log level: trace | debug | info | warn | error
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON structured logs
    #[arg(long)]
    pub log_json: bool,
}

impl ConfigArgs {
    /// Build the effective config. Does not validate.
    pub fn resolve(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)
                .with_context(|| format!("load config '{}'", path.display()))?,
            None => BridgeConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(addr) = &self.addr {
            config.server.address = addr.clone();
        }
        if let Some(key) = &self.key {
            config.pushover.user_key = key.clone();
        }
        if let Some(token) = &self.token {
            config.pushover.app_token = token.clone();
        }

        let toggles = &mut config.notify;
        if let Some(v) = self.notify_fill {
            toggles.fill = v;
        }
        if let Some(v) = self.notify_disband {
            toggles.disband = v;
        }
        if let Some(v) = self.notify_join {
            toggles.join = v;
        }
        if let Some(v) = self.notify_leave {
            toggles.leave = v;
        }

        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if self.log_json {
            config.log.json = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = ConfigArgs {
            addr: Some("10.0.0.5:10501".into()),
            key: Some("ukey".into()),
            notify_fill: Some(false),
            notify_join: Some(true),
            log_json: true,
            ..Default::default()
        };
        let cfg = args.resolve().unwrap();
        assert_eq!(cfg.server.ws_url(), "ws://10.0.0.5:10501/MiniParse");
        assert_eq!(cfg.pushover.user_key, "ukey");
        assert!(cfg.pushover.app_token.is_empty());
        assert!(!cfg.notify.fill);
        assert!(cfg.notify.join);
        assert!(!cfg.notify.leave);
        assert!(cfg.log.json);
    }

    #[test]
    fn no_flags_is_default_config() {
        assert_eq!(ConfigArgs::default().resolve().unwrap(), BridgeConfig::default());
    }
}
