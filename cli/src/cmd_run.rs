//! `partyping run`: the bridge itself.

use std::sync::Arc;

use anyhow::{Context, Result};
use partyping_core::{BridgeConfig, Classifier, LogSink, NotificationSink};
use partyping_pushover::PushoverClient;
use partyping_ws::{run_with_reconnect, FrameDispatcher, ReconnectPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run(config: BridgeConfig, dry_run: bool) -> Result<()> {
    config
        .validate(!dry_run)
        .context("invalid configuration")?;

    let sink: Arc<dyn NotificationSink> = if dry_run {
        Arc::new(LogSink)
    } else {
        Arc::new(PushoverClient::new(&config.pushover).context("build Pushover client")?)
    };

    if config.notify.is_silent() {
        warn!("all notification toggles are off; nothing will be sent");
    }

    let dispatcher = Arc::new(FrameDispatcher::new(Classifier::new(config.notify), sink));
    let stats = dispatcher.stats();

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => trigger.cancel(),
            Err(e) => warn!(error = %e, "failed to listen for interrupt signal"),
        }
    });

    let url = config.server.ws_url();
    info!(
        url = %url,
        sink = dispatcher.sink_name(),
        toggles = ?config.notify,
        "starting partyping"
    );

    let outcome = run_with_reconnect(
        &url,
        dispatcher,
        shutdown,
        config.session.shutdown_grace(),
        &ReconnectPolicy::from(&config.reconnect),
    )
    .await
    .context("connect to event stream server")?;

    let s = stats.snapshot();
    info!(
        ?outcome,
        frames = s.frames,
        chat_lines = s.chat_lines,
        notifications_sent = s.notifications_sent,
        delivery_failures = s.delivery_failures,
        "partyping stopped"
    );
    Ok(())
}
