//! Liveness tracking for one active stream.
//!
//! The monitor only observes: it records when the last event arrived, keeps a
//! [`ConnectionState`], and emits [`ResilienceEvent`]s. Deciding what a
//! heartbeat timeout means (reconnect, abort, ignore) is left to the caller.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{ConnectionState, ResilienceCallback, ResilienceConfig, ResilienceEvent};

/// Connection monitor handle. Clones share the same state.
#[derive(Clone)]
pub struct ConnectionMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    heartbeat_timeout: Duration,
    check_interval: Duration,
    state: Mutex<MonitorState>,
    /// Serializes transitions and their notifications. Re-entrant so a
    /// callback may query or drive the monitor from the same thread.
    notify: ReentrantMutex<()>,
    callback: RwLock<Option<ResilienceCallback>>,
}

struct MonitorState {
    connection: ConnectionState,
    failure_reason: Option<String>,
    last_event_at: Instant,
    checker: Option<JoinHandle<()>>,
}

impl ConnectionMonitor {
    /// Create a stopped monitor using the heartbeat settings of `config`.
    #[must_use]
    pub fn new(config: &ResilienceConfig) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                heartbeat_timeout: config.heartbeat_timeout(),
                check_interval: config.heartbeat_check_interval(),
                state: Mutex::new(MonitorState {
                    connection: ConnectionState::Disconnected,
                    failure_reason: None,
                    last_event_at: Instant::now(),
                    checker: None,
                }),
                notify: ReentrantMutex::new(()),
                callback: RwLock::new(None),
            }),
        }
    }

    /// Builder: register the notification callback.
    #[must_use]
    pub fn with_callback(self, callback: ResilienceCallback) -> Self {
        self.on_event(callback);
        self
    }

    /// Register (or replace) the notification callback.
    pub fn on_event(&self, callback: ResilienceCallback) {
        *self.inner.callback.write() = Some(callback);
    }

    /// Reset the heartbeat clock, enter `Connecting` and start the periodic liveness check.
    pub fn start(&self) {
        {
            let mut state = self.inner.state.lock();
            state.last_event_at = Instant::now();
            if let Some(previous) = state.checker.take() {
                previous.abort();
            }
            state.checker = self.spawn_checker();
        }
        info!(
            heartbeat_timeout_ms = self.inner.heartbeat_timeout.as_millis(),
            "Connection monitor started"
        );
        self.inner.set_state(ConnectionState::Connecting, None);
    }

    /// Record an observed event; promotes `Connecting`/`Reconnecting` to `Connected`.
    pub fn record_event(&self) {
        let promote = {
            let mut state = self.inner.state.lock();
            state.last_event_at = Instant::now();
            matches!(
                state.connection,
                ConnectionState::Connecting | ConnectionState::Reconnecting
            )
        };
        if promote {
            self.inner.set_state(ConnectionState::Connected, None);
        }
    }

    /// Force the `Reconnecting` state.
    pub fn mark_reconnecting(&self) {
        self.inner.set_state(ConnectionState::Reconnecting, None);
    }

    /// Stop the liveness check and enter `Failed`.
    pub fn mark_failed(&self, reason: Option<&str>) {
        self.inner.stop_checker();
        if let Some(reason) = reason {
            warn!(reason, "Connection marked failed");
        }
        self.inner
            .set_state(ConnectionState::Failed, reason.map(str::to_string));
    }

    /// Stop the liveness check and enter `Disconnected`.
    ///
    /// `Failed` and `Disconnected` are both terminal for a monitor lifecycle,
    /// so a monitor already in `Failed` stays there with its reason. Teardown
    /// after a failure (the adapter always stops on exit) must not turn a
    /// failure into a clean disconnect. Only [`Self::start`] leaves `Failed`.
    pub fn stop(&self) {
        self.inner.stop_checker();
        if self.state() == ConnectionState::Failed {
            debug!("Connection monitor stopped after failure");
            return;
        }
        self.inner.set_state(ConnectionState::Disconnected, None);
    }

    /// Evaluate liveness once, emitting `HeartbeatTimeout` when the stream is stale.
    ///
    /// Returns true if a timeout was emitted. Terminal states never time out.
    pub fn check_liveness(&self) -> bool {
        self.inner.check_liveness()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().connection
    }

    /// Reason recorded by the last `mark_failed`, if the monitor is `Failed`.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        self.inner.state.lock().failure_reason.clone()
    }

    /// When the last event was observed (or the monitor was started).
    #[must_use]
    pub fn last_event_at(&self) -> Instant {
        self.inner.state.lock().last_event_at
    }

    /// Time elapsed since the last observed event.
    #[must_use]
    pub fn time_since_last_event(&self) -> Duration {
        self.last_event_at().elapsed()
    }

    /// Whether the periodic liveness check is running.
    #[must_use]
    pub fn is_checking(&self) -> bool {
        self.inner
            .state
            .lock()
            .checker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Configured heartbeat timeout.
    #[must_use]
    pub fn heartbeat_timeout(&self) -> Duration {
        self.inner.heartbeat_timeout
    }

    fn spawn_checker(&self) -> Option<JoinHandle<()>> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime; periodic liveness check disabled");
            return None;
        };

        let weak: Weak<MonitorInner> = Arc::downgrade(&self.inner);
        let interval = self.inner.check_interval;

        Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.check_liveness();
            }
        }))
    }
}

impl MonitorInner {
    /// Single transition point; suppresses no-op transitions.
    fn set_state(&self, next: ConnectionState, reason: Option<String>) -> bool {
        let _serial = self.notify.lock();

        let previous = {
            let mut state = self.state.lock();
            if state.connection == next {
                return false;
            }
            let previous = state.connection;
            state.connection = next;
            state.failure_reason = if next == ConnectionState::Failed {
                reason.clone()
            } else {
                None
            };
            previous
        };

        debug!(from = %previous, to = %next, "Connection state changed");
        self.emit(&ResilienceEvent::StateChange {
            state: next,
            reason,
        });
        true
    }

    fn check_liveness(&self) -> bool {
        let (connection, last_event_at) = {
            let state = self.state.lock();
            (state.connection, state.last_event_at)
        };
        if connection.is_terminal() {
            return false;
        }

        let silent_for = last_event_at.elapsed();
        if silent_for <= self.heartbeat_timeout {
            return false;
        }

        warn!(
            silent_for_ms = silent_for.as_millis(),
            timeout_ms = self.heartbeat_timeout.as_millis(),
            "Heartbeat timeout"
        );
        let _serial = self.notify.lock();
        self.emit(&ResilienceEvent::HeartbeatTimeout {
            last_event_at,
            silent_for,
        });
        true
    }

    fn stop_checker(&self) {
        if let Some(handle) = self.state.lock().checker.take() {
            handle.abort();
        }
    }

    fn emit(&self, event: &ResilienceEvent) {
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().checker.take() {
            handle.abort();
        }
    }
}

impl fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConnectionMonitor")
            .field("state", &state.connection)
            .field("failure_reason", &state.failure_reason)
            .field("heartbeat_timeout", &self.inner.heartbeat_timeout)
            .field("checking", &state.checker.is_some())
            .finish_non_exhaustive()
    }
}
