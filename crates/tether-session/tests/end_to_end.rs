//! A session driving a flaky stream, a short-lived credential, the guard and
//! the write buffer together.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tether_session::buffer::{ChunkAppend, InMemoryMessageStore};
use tether_session::credential::{CredentialConfig, CredentialEvent, TokenState};
use tether_session::guard::{InFlightGuard, OperationStatus};
use tether_session::stream::{
    ConnectionState, ResilienceCallback, ResilienceEvent, RetryError, StreamError,
};
use tether_session::{Session, SessionConfig};
use tokio::sync::Notify;

fn session_with(config: SessionConfig) -> (Session, Arc<InMemoryMessageStore>) {
    let store = Arc::new(InMemoryMessageStore::new());
    let session = Session::new(config, store.clone())
        .unwrap()
        .with_guard(Arc::new(InFlightGuard::new()));
    (session, store)
}

fn recorder() -> (ResilienceCallback, Arc<Mutex<Vec<ResilienceEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let callback: ResilienceCallback = Arc::new(move |event: &ResilienceEvent| {
        sink.lock().push(event.clone());
    });
    (callback, events)
}

fn states(events: &[ResilienceEvent]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|event| match event {
            ResilienceEvent::StateChange { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

fn dropping_source() -> impl futures_util::Stream<Item = Result<&'static str, StreamError>> {
    stream::iter(vec![
        Ok("a"),
        Ok("b"),
        Ok("c"),
        Err(StreamError::Upstream("fetch failed: network error".into())),
    ])
}

#[tokio::test(start_paused = true)]
async fn adapter_surfaces_mid_stream_failure_as_retryable() {
    let (session, _) = session_with(SessionConfig::default());
    let (callback, events) = recorder();
    session.on_resilience_event(callback);

    let mut adapted = session.adapt(dropping_source());
    let mut received = Vec::new();
    let mut failure = None;
    while let Some(item) = adapted.next().await {
        match item {
            Ok(event) => received.push(event),
            Err(error) => failure = Some(error),
        }
    }

    assert_eq!(received, vec!["a", "b", "c"]);
    let failure = failure.unwrap();
    assert_eq!(failure.to_string(), "fetch failed: network error");
    assert!(failure.is_retryable());
    assert_eq!(session.monitor().state(), ConnectionState::Failed);
    assert_eq!(
        session.monitor().failure_reason().as_deref(),
        Some("fetch failed: network error")
    );
    assert_eq!(
        states(&events.lock()),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Failed,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn run_with_retry_reconnects_through_session() {
    let mut config = SessionConfig::default();
    config.resilience = config.resilience.with_initial_backoff_ms(100);
    let (session, _) = session_with(config);
    let (callback, events) = recorder();
    session.on_resilience_event(callback);

    let session = &session;
    let attempts = AtomicU32::new(0);
    let collected = session
        .run_with_retry(|attempt| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                let source = if attempt == 0 {
                    dropping_source().left_stream()
                } else {
                    stream::iter(vec![Ok("a"), Ok("b"), Ok("c"), Ok("d")]).right_stream()
                };
                let mut adapted = session.adapt(source);
                let mut received = Vec::new();
                while let Some(item) = adapted.next().await {
                    received.push(item?);
                }
                Ok::<_, StreamError>(received)
            }
        })
        .await
        .unwrap();

    assert_eq!(collected, vec!["a", "b", "c", "d"]);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(session.monitor().state(), ConnectionState::Disconnected);
    let events = events.lock();
    assert!(
        events
            .iter()
            .any(|event| matches!(event, ResilienceEvent::RetryAttempt { attempt: 1, .. }))
    );
    assert_eq!(
        events.last(),
        Some(&ResilienceEvent::ReconnectSuccess { attempt: 1 })
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_backoff() {
    let mut config = SessionConfig::default();
    config.resilience = config
        .resilience
        .with_initial_backoff_ms(60_000)
        .with_max_backoff_ms(60_000);
    let (session, _) = session_with(config);
    let session = Arc::new(session);

    let stopper = Arc::clone(&session);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        stopper.shutdown().await;
    });

    let result: Result<(), _> = session
        .run_with_retry(|_| async { Err(StreamError::ConnectionFailed("ECONNRESET".into())) })
        .await;
    assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1, .. })));
}

#[tokio::test]
async fn expiring_token_stays_usable_while_refreshing_in_background() {
    let mut config = SessionConfig::default();
    config.credential = CredentialConfig::new().with_pre_refresh_window_ms(300_000);
    let (session, _) = session_with(config);
    let credentials = session.credentials();

    let kinds = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&kinds);
    credentials.on_event(Arc::new(move |event: &CredentialEvent| {
        sink.lock().push(event.kind());
    }));

    let invoked = Arc::new(Notify::new());
    let signal = Arc::clone(&invoked);
    credentials.register_refresh_fn(move || {
        let signal = Arc::clone(&signal);
        async move {
            signal.notify_one();
            true
        }
    });

    let now = chrono::Utc::now().timestamp_millis();
    credentials.update_token_info(Some("access".into()), Some(now + 60_000), Some("refresh".into()));
    assert_eq!(credentials.token_state(), TokenState::ExpiringSoon);

    assert!(credentials.check_and_refresh_if_needed().await);
    tokio::time::timeout(Duration::from_secs(5), invoked.notified())
        .await
        .unwrap();

    assert_eq!(
        credentials.authorization_header().as_deref(),
        Some("Bearer access")
    );
    assert_eq!(kinds.lock().first().copied(), Some("token_expiring_soon"));
}

#[tokio::test(start_paused = true)]
async fn guard_keeps_protected_operation_running_after_disconnect() {
    let (session, _) = session_with(SessionConfig::default());
    let guard = session.guard();
    assert!(guard.protect("tool-write-file"));

    let mut adapted = session.adapt(dropping_source());
    while adapted.next().await.is_some() {}
    assert_eq!(session.monitor().state(), ConnectionState::Failed);

    let reconciled = guard.reconcile([
        ("tool-write-file", OperationStatus::Cancelled),
        ("tool-search", OperationStatus::Cancelled),
    ]);
    assert_eq!(reconciled[0].effective, OperationStatus::Running);
    assert_eq!(reconciled[1].effective, OperationStatus::Cancelled);

    guard.complete("tool-write-file");
    assert!(guard.is_effectively_cancelled("tool-write-file", OperationStatus::Cancelled));
    assert_eq!(guard.protected_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_buffered_text() {
    let (session, store) = session_with(SessionConfig::default());
    for chunk in ["Hel", "lo ", "world"] {
        session
            .buffer()
            .append(ChunkAppend::accumulate("msg-1", "logical-1", "conv-1", chunk))
            .await;
    }
    assert_eq!(store.write_count(), 0);

    assert_eq!(session.shutdown().await, 1);
    assert_eq!(
        store.content_of("conv-1", "logical-1").as_deref(),
        Some("Hello world")
    );
    assert_eq!(store.write_count(), 1);
}
