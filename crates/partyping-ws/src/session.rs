//! `StreamSession`: one WebSocket connection to the event stream server.
//!
//! # Lifecycle
//! ```text
//! Connecting ──dial ok──▶ Connected ──shutdown──▶ Closing
//!      │                      │
//!   dial err            read/decode err,
//!      ▼                 server close
//!  SessionError               ▼
//!                         Terminated
//! ```
//! Closing and Terminated are final; a session is never reused.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::FrameDispatcher;
use crate::error::SessionError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle stage of a [`StreamSession`], reported in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    /// Close frame sent, waiting out the grace period.
    Closing,
    /// The receive loop ended on its own.
    Terminated,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Closing => write!(f, "closing"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Why a receive loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The server sent a close frame.
    ServerClosed,
    /// The stream ended without a close frame.
    StreamEnded,
    /// Transport read error.
    Transport(String),
    /// A frame could not be decoded as an envelope.
    Decode(String),
    /// The receive task panicked or was cancelled.
    TaskFailed(String),
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerClosed => write!(f, "closed by server"),
            Self::StreamEnded => write!(f, "stream ended"),
            Self::Transport(e) => write!(f, "read error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
            Self::TaskFailed(e) => write!(f, "receive task failed: {e}"),
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Shutdown was requested and the close frame was sent. `drained` is
    /// `true` if the receive loop finished within the grace period.
    Closed { drained: bool },
    /// The receive loop ended before any shutdown request.
    Terminated(TerminationReason),
    /// Shutdown was requested while no session was connected.
    Interrupted,
}

impl SessionOutcome {
    /// `true` if the session ended because shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::Interrupted)
    }
}

/// A connected stream session.
pub struct StreamSession {
    url: String,
    ws: WsStream,
}

impl StreamSession {
    /// Dial `url` once. There is no retry here; see
    /// [`run_with_reconnect`](crate::reconnect::run_with_reconnect).
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let parsed = url::Url::parse(url).map_err(|e| SessionError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(SessionError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        debug!(url, state = %SessionState::Connecting, "dialing stream server");
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| SessionError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        info!(url, state = %SessionState::Connected, "connected to websocket server");
        Ok(Self {
            url: url.to_string(),
            ws,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run the session until the receive loop ends or `shutdown` fires.
    ///
    /// Frames are handled on a dedicated task. On shutdown a normal-closure
    /// close frame is written and the receive loop gets `grace` to finish
    /// before it is aborted.
    pub async fn run(
        self,
        dispatcher: Arc<FrameDispatcher>,
        shutdown: CancellationToken,
        grace: Duration,
    ) -> SessionOutcome {
        let Self { url, ws } = self;
        let (mut sink, stream) = ws.split();
        let mut reader: JoinHandle<TerminationReason> =
            tokio::spawn(receive_loop(stream, dispatcher));

        tokio::select! {
            joined = &mut reader => {
                let reason = match joined {
                    Ok(reason) => reason,
                    Err(e) => TerminationReason::TaskFailed(e.to_string()),
                };
                info!(url = %url, state = %SessionState::Terminated, %reason, "session ended");
                SessionOutcome::Terminated(reason)
            }
            _ = shutdown.cancelled() => {
                info!(url = %url, state = %SessionState::Closing, "interrupt detected, closing connection");

                let close = Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                }));
                if let Err(e) = sink.send(close).await {
                    warn!(error = %e, "failed to write close frame");
                    reader.abort();
                    return SessionOutcome::Closed { drained: false };
                }

                let drained = match tokio::time::timeout(grace, &mut reader).await {
                    Ok(_) => true,
                    Err(_) => {
                        debug!(grace_ms = grace.as_millis() as u64, "grace period elapsed");
                        reader.abort();
                        false
                    }
                };
                SessionOutcome::Closed { drained }
            }
        }
    }
}

/// Receive loop. Owns the read half of the socket.
async fn receive_loop(
    mut stream: SplitStream<WsStream>,
    dispatcher: Arc<FrameDispatcher>,
) -> TerminationReason {
    while let Some(msg) = stream.next().await {
        let frame = match msg {
            Err(e) => {
                warn!(error = %e, "websocket read error");
                return TerminationReason::Transport(e.to_string());
            }
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(data)) => data,
            Ok(Message::Close(frame)) => {
                info!(?frame, "websocket closed by server");
                return TerminationReason::ServerClosed;
            }
            Ok(_) => continue, // ping / pong are answered by the protocol layer
        };

        if let Err(e) = dispatcher.dispatch(&frame).await {
            warn!(error = %e, "failed to decode frame");
            return TerminationReason::Decode(e.to_string());
        }
    }
    TerminationReason::StreamEnded
}
