//! StreamSession against a local WebSocket server.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use partyping_core::{Classifier, Notification, NotificationSink, NotifyError, NotifyToggles};
use partyping_ws::{
    run_with_reconnect, FrameDispatcher, ReconnectPolicy, SessionError, SessionOutcome,
    StreamSession, TerminationReason,
};

// ─── Helpers ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recording {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSink for Recording {
    async fn deliver(&self, n: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(n.clone());
        Ok(())
    }
    fn name(&self) -> &str {
        "recording"
    }
}

impl Recording {
    fn titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }
}

fn dispatcher(toggles: NotifyToggles) -> (Arc<FrameDispatcher>, Arc<Recording>) {
    let sink = Arc::new(Recording::default());
    let d = Arc::new(FrameDispatcher::new(Classifier::new(toggles), sink.clone()));
    (d, sink)
}

fn join_and_fill() -> NotifyToggles {
    NotifyToggles {
        fill: true,
        join: true,
        ..Default::default()
    }
}

fn chat(payload: &str) -> Message {
    Message::Text(serde_json::json!({ "msgtype": "Chat", "msg": payload }).to_string())
}

/// Accept `connections` WebSocket clients in turn, handing each to `handler`.
async fn start_server<F, Fut>(connections: usize, handler: F) -> String
where
    F: Fn(usize, WebSocketStream<TcpStream>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for i in 0..connections {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(i, ws).await;
        }
    });

    format!("ws://{addr}/MiniParse")
}

const GRACE: Duration = Duration::from_secs(1);

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn frames_flow_through_to_the_sink() {
    let url = start_server(1, |_, mut ws| async move {
        ws.send(Message::Text(
            r#"{"msgtype":"ChangeZone","msg":{"zoneID":1}}"#.into(),
        ))
        .await
        .unwrap();
        ws.send(chat(
            "00|2024-01-01T00:00:00.000000000Z|39|System|Your alliance have been filled.",
        ))
        .await
        .unwrap();
        ws.send(chat(
            "00|2024-01-01T00:00:00.000000000Z|2239|System|Someone joins the party.",
        ))
        .await
        .unwrap();
        // party-status code with join text: no notification
        ws.send(chat(
            "00|2024-01-01T00:00:00.000000000Z|39|System|Someone joins the party.",
        ))
        .await
        .unwrap();
        ws.send(chat("01|2024-01-01T00:00:00Z|39|System|Your alliance have been filled."))
            .await
            .unwrap();
        ws.close(None).await.unwrap();
    })
    .await;

    let (d, sink) = dispatcher(join_and_fill());
    let session = StreamSession::connect(&url).await.unwrap();
    assert_eq!(session.url(), url);

    let outcome = session
        .run(d.clone(), CancellationToken::new(), GRACE)
        .await;

    assert_eq!(outcome, SessionOutcome::Terminated(TerminationReason::ServerClosed));
    assert_eq!(
        sink.titles(),
        vec!["Your Party Has Filled", "Player Joined Your Party"]
    );

    let stats = d.stats().snapshot();
    assert_eq!(stats.frames, 5);
    assert_eq!(stats.chat_lines, 4);
    assert_eq!(stats.log_lines, 3);
    assert_eq!(stats.notifications_sent, 2);
}

#[tokio::test]
async fn binary_frames_are_decoded_too() {
    let url = start_server(1, |_, mut ws| async move {
        let body = serde_json::json!({
            "msgtype": "Chat",
            "msg": "00|2024-01-01T00:00:00Z|39|System|Your party have been filled."
        })
        .to_string();
        ws.send(Message::Binary(body.into_bytes())).await.unwrap();
        ws.close(None).await.unwrap();
    })
    .await;

    let (d, sink) = dispatcher(NotifyToggles::default());
    let session = StreamSession::connect(&url).await.unwrap();
    session.run(d, CancellationToken::new(), GRACE).await;

    assert_eq!(sink.titles(), vec!["Your Party Has Filled"]);
}

#[tokio::test]
async fn malformed_frame_terminates_the_session() {
    let url = start_server(1, |_, mut ws| async move {
        ws.send(Message::Text("definitely not json".into()))
            .await
            .unwrap();
        ws.send(chat(
            "00|2024-01-01T00:00:00Z|39|System|Your party have been filled.",
        ))
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    })
    .await;

    let (d, sink) = dispatcher(NotifyToggles::default());
    let session = StreamSession::connect(&url).await.unwrap();
    let outcome = session.run(d, CancellationToken::new(), GRACE).await;

    assert!(matches!(
        outcome,
        SessionOutcome::Terminated(TerminationReason::Decode(_))
    ));
    assert!(sink.titles().is_empty());
}

#[tokio::test]
async fn shutdown_sends_normal_close_and_drains() {
    let (code_tx, code_rx) = oneshot::channel::<Option<u16>>();
    let code_tx = Arc::new(Mutex::new(Some(code_tx)));

    let url = start_server(1, move |_, mut ws| {
        let code_tx = Arc::clone(&code_tx);
        async move {
            // Keep polling so the close reply is flushed.
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Close(frame) = msg {
                    if let Some(tx) = code_tx.lock().unwrap().take() {
                        let _ = tx.send(frame.map(|f| u16::from(f.code)));
                    }
                }
            }
        }
    })
    .await;

    let (d, _sink) = dispatcher(NotifyToggles::default());
    let session = StreamSession::connect(&url).await.unwrap();

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = session.run(d, shutdown, GRACE).await;

    assert_eq!(outcome, SessionOutcome::Closed { drained: true });
    assert!(outcome.is_shutdown());
    assert_eq!(code_rx.await.unwrap(), Some(1000));
}

#[tokio::test]
async fn shutdown_gives_up_after_grace_period() {
    let url = start_server(1, |_, ws| async move {
        // Never read, so the close handshake is never answered.
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(ws);
    })
    .await;

    let (d, _sink) = dispatcher(NotifyToggles::default());
    let session = StreamSession::connect(&url).await.unwrap();

    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let started = Instant::now();
    let outcome = session
        .run(d, shutdown, Duration::from_millis(200))
        .await;

    assert_eq!(outcome, SessionOutcome::Closed { drained: false });
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn dial_failure_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = StreamSession::connect(&format!("ws://{addr}/MiniParse"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SessionError::Connect { .. }));

    let err = StreamSession::connect("http://127.0.0.1:1/MiniParse")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SessionError::InvalidUrl { .. }));
}

#[tokio::test]
async fn single_attempt_without_reconnect_policy() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (d, _sink) = dispatcher(NotifyToggles::default());
    let result = run_with_reconnect(
        &format!("ws://{addr}/MiniParse"),
        d,
        CancellationToken::new(),
        GRACE,
        &ReconnectPolicy::disabled(),
    )
    .await;

    assert!(matches!(result, Err(SessionError::Connect { .. })));
}

#[tokio::test]
async fn reconnects_after_server_close() {
    let url = start_server(2, |i, mut ws| async move {
        if i == 1 {
            ws.send(chat(
                "00|2024-01-01T00:00:00Z|39|System|Your party have been filled.",
            ))
            .await
            .unwrap();
        }
        ws.close(None).await.unwrap();
    })
    .await;

    let (d, sink) = dispatcher(NotifyToggles::default());
    let policy = ReconnectPolicy {
        max_retries: 1,
        initial_backoff: Duration::from_millis(20),
        max_backoff: Duration::from_millis(20),
        multiplier: 1.0,
        stable_after: Duration::ZERO,
    };

    // Every session counts as stable, so each close earns a fresh retry.
    // Two sessions run, then the third dial finds no listener.
    let result = run_with_reconnect(&url, d, CancellationToken::new(), GRACE, &policy).await;

    assert!(matches!(result, Err(SessionError::Connect { .. })));
    assert_eq!(sink.titles(), vec!["Your Party Has Filled"]);
}

#[tokio::test]
async fn shutdown_during_backoff_is_interrupted() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (d, _sink) = dispatcher(NotifyToggles::default());
    let policy = ReconnectPolicy {
        max_retries: 10,
        initial_backoff: Duration::from_secs(30),
        max_backoff: Duration::from_secs(30),
        multiplier: 1.0,
        stable_after: Duration::from_secs(10),
    };
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = run_with_reconnect(
        &format!("ws://{addr}/MiniParse"),
        d,
        shutdown,
        GRACE,
        &policy,
    )
    .await;

    assert_eq!(result.unwrap(), SessionOutcome::Interrupted);
}

#[tokio::test]
async fn short_lived_sessions_use_up_the_retry_budget() {
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    // Room for more connections than the budget allows.
    let url = start_server(10, move |_, mut ws| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            ws.close(None).await.unwrap();
        }
    })
    .await;

    let (d, _sink) = dispatcher(NotifyToggles::default());
    let policy = ReconnectPolicy {
        max_retries: 2,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(10),
        multiplier: 1.0,
        stable_after: Duration::from_secs(60),
    };

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        run_with_reconnect(&url, d, CancellationToken::new(), GRACE, &policy),
    )
    .await
    .expect("reconnect loop should give up");

    assert_eq!(
        result.unwrap(),
        SessionOutcome::Terminated(TerminationReason::ServerClosed)
    );
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn dropped_connection_ends_the_session() {
    let url = start_server(1, |_, ws| async move {
        // No close handshake: the TCP stream just goes away.
        drop(ws);
    })
    .await;

    let (d, sink) = dispatcher(NotifyToggles::default());
    let session = StreamSession::connect(&url).await.unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        session.run(d, CancellationToken::new(), GRACE),
    )
    .await
    .expect("session should end when the peer disappears");

    assert!(
        matches!(
            outcome,
            SessionOutcome::Terminated(
                TerminationReason::Transport(_) | TerminationReason::StreamEnded
            )
        ),
        "unexpected outcome: {outcome:?}"
    );
    assert!(sink.titles().is_empty());
}
