//! Subscriber installation for the `partyping` binary.

use partyping_core::config::LogConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Call once, before the first log line.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directives()))
        .unwrap_or_else(|e| {
            eprintln!("ignoring bad [log] filter ({e}), falling back to info");
            EnvFilter::new("info")
        });

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}
