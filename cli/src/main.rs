//! partyping CLI: forwards party events from ACT / IINACT to Pushover.
//!
//! # Commands
//! ```text
//! partyping run        [--config <path>] [--addr <host:port>] [--key <user key>] [--dry-run]
//! partyping classify   <payload> [--envelope] [--json]
//! partyping send-test  [--message <text>]
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd_classify;
mod cmd_run;
mod settings;
mod tracing_setup;

use settings::ConfigArgs;

#[derive(Parser)]
#[command(
    name = "partyping",
    about = "Push party alerts from ACT / IINACT chat logs to your phone",
    long_about = "
partyping connects to the ACT / IINACT websocket server (MiniParse endpoint),
watches chat log lines for party events and sends Pushover notifications.

ENVIRONMENT VARIABLES:
  PARTYPING_USER_KEY    Pushover user key (same as --key)
  PARTYPING_APP_TOKEN   Pushover application token (same as --token)
  RUST_LOG              Overrides the configured log level
",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the stream server and forward notifications until Ctrl-C
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run: bool,
        /// Reconnect this many times after the session ends [default: 0]
        #[arg(long, value_name = "N")]
        reconnect_attempts: Option<u32>,
    },

    /// Show the notification a single chat payload would produce
    Classify {
        /// Raw log line, e.g. '00|2024-01-01T00:00:00Z|39|System|...'
        payload: String,
        /// Treat the payload as a full {"msgtype","msg"} frame
        #[arg(long)]
        envelope: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Send one test notification to check the Pushover credentials
    #[command(name = "send-test")]
    SendTest {
        #[command(flatten)]
        config: ConfigArgs,
        /// Message body of the test notification
        #[arg(long, default_value = "partyping is set up correctly.")]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            dry_run,
            reconnect_attempts,
        } => {
            let mut cfg = config.resolve()?;
            if let Some(n) = reconnect_attempts {
                cfg.reconnect.max_retries = n;
            }
            tracing_setup::init_tracing(&cfg.log);
            cmd_run::run(cfg, dry_run).await
        }

        Commands::Classify {
            payload,
            envelope,
            json,
            config,
        } => {
            let cfg = config.resolve()?;
            tracing_setup::init_tracing(&cfg.log);
            cmd_classify::run(&cfg, &payload, envelope, json)
        }

        Commands::SendTest { config, message } => {
            let cfg = config.resolve()?;
            tracing_setup::init_tracing(&cfg.log);
            cmd_send_test::run(&cfg, &message).await
        }
    }
}
