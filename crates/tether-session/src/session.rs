//! One streamed conversation session and its collaborators.

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use tether_buffer::{FlushMode, MessageStore, StreamBuffer};
use tether_credential::CredentialManager;
use tether_guard::InFlightGuard;
use tether_stream::{
    ConnectionMonitor, ResilienceCallback, ResilientStream, RetryDriver, RetryError,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::{SessionConfig, SessionError, SessionResult};

static DEFAULT_GUARD: LazyLock<Arc<InFlightGuard>> =
    LazyLock::new(|| Arc::new(InFlightGuard::new()));

/// Process-wide guard shared by sessions that were not given their own.
#[must_use]
pub fn default_guard() -> Arc<InFlightGuard> {
    Arc::clone(&DEFAULT_GUARD)
}

/// Wires a connection monitor, retry driver, credential manager, write
/// buffer and in-flight guard for one session.
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    monitor: ConnectionMonitor,
    credentials: CredentialManager,
    buffer: StreamBuffer,
    guard: Arc<InFlightGuard>,
    cancel: CancellationToken,
    resilience_callback: RwLock<Option<ResilienceCallback>>,
}

impl Session {
    /// Create a session persisting streamed content into `store`.
    ///
    /// Uses the process-wide [`default_guard`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: SessionConfig, store: Arc<dyn MessageStore>) -> SessionResult<Self> {
        config.validate().map_err(SessionError::InvalidConfig)?;

        let id = Uuid::new_v4();
        let session = Self {
            id,
            monitor: ConnectionMonitor::new(&config.resilience),
            credentials: CredentialManager::new(config.credential.clone()),
            buffer: StreamBuffer::new(store, config.buffer.clone()),
            guard: default_guard(),
            cancel: CancellationToken::new(),
            resilience_callback: RwLock::new(None),
            config,
        };
        info!(session_id = %id, "Session created");
        Ok(session)
    }

    /// Builder: use `guard` instead of the process-wide default.
    #[must_use]
    pub fn with_guard(mut self, guard: Arc<InFlightGuard>) -> Self {
        self.guard = guard;
        self
    }

    /// Route monitor and retry notifications to `callback`.
    pub fn on_resilience_event(&self, callback: ResilienceCallback) {
        self.monitor.on_event(Arc::clone(&callback));
        *self.resilience_callback.write() = Some(callback);
    }

    /// Session id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Settings of this session.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Liveness monitor of the current connection.
    #[must_use]
    pub const fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    /// Credential lifecycle manager.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Write-coalescing buffer.
    #[must_use]
    pub const fn buffer(&self) -> &StreamBuffer {
        &self.buffer
    }

    /// In-flight operation guard.
    #[must_use]
    pub const fn guard(&self) -> &Arc<InFlightGuard> {
        &self.guard
    }

    /// Token cancelled on shutdown; also aborts retry backoff waits.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wrap an event source so it drives this session's monitor.
    pub fn adapt<S>(&self, source: S) -> ResilientStream<S> {
        ResilientStream::new(source, self.monitor.clone())
    }

    /// Retry driver configured from this session.
    #[must_use]
    pub fn retry_driver(&self) -> RetryDriver {
        let driver = RetryDriver::new(self.config.resilience.clone())
            .with_cancellation(self.cancel.child_token())
            .with_monitor(self.monitor.clone());
        match self.resilience_callback.read().clone() {
            Some(callback) => driver.with_callback(callback),
            None => driver,
        }
    }

    /// Run `attempt` with this session's retry policy.
    ///
    /// # Errors
    ///
    /// See [`RetryDriver::run`].
    pub async fn run_with_retry<T, E, F, Fut>(&self, attempt: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry_driver().run(attempt).await
    }

    /// Refresh the credential now and wait for the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Credential`] if no refresh operation was
    /// registered. An unsuccessful refresh is `Ok(false)`.
    pub async fn refresh_credentials(&self) -> SessionResult<bool> {
        Ok(self.credentials.force_refresh().await?)
    }

    /// Persist the final content of a streamed message and release its entry.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Buffer`] if nothing is buffered for the id or
    /// the write failed; on a failed write the content stays buffered.
    pub async fn finish_message(&self, logical_message_id: &str) -> SessionResult<()> {
        self.buffer
            .flush(logical_message_id, FlushMode::Clear)
            .await?;
        Ok(())
    }

    /// Stop the session: cancel waits, stop the monitor, flush buffered
    /// content and forget credentials.
    ///
    /// The guard is left alone since it may be shared. Returns the number of
    /// buffer entries flushed.
    pub async fn shutdown(&self) -> usize {
        self.cancel.cancel();
        self.monitor.stop();
        let flushed = self.buffer.flush_all().await;
        self.credentials.clear();
        info!(session_id = %self.id, flushed, "Session shut down");
        flushed
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.monitor.state())
            .field("credentials", &self.credentials)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}
