//! Credential lifecycle manager.
//!
//! Tracks one credential's expiry, refreshes it preventively inside the
//! pre-refresh window and reactively once expired, and coalesces concurrent
//! refresh requests into a single shared attempt.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::state::CredentialRecord;
use crate::{
    CredentialCallback, CredentialConfig, CredentialError, CredentialEvent, CredentialResult,
    CredentialSnapshot, TokenState,
};

/// Expiry reported after a refresh that did not push a new expiry.
const FALLBACK_VALIDITY_MS: i64 = 60 * 60 * 1_000;

/// Caller-supplied operation obtaining fresh token material.
///
/// Implementations push the new material through
/// [`CredentialManager::update_token_info`] and report success. They may be
/// invoked several times per refresh request.
#[async_trait]
pub trait RefreshOperation: Send + Sync {
    /// Perform one refresh attempt.
    async fn refresh(&self) -> bool;
}

struct RefreshFn<F>(F);

#[async_trait]
impl<F, Fut> RefreshOperation for RefreshFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn refresh(&self) -> bool {
        (self.0)().await
    }
}

type SharedRefresh = Shared<BoxFuture<'static, bool>>;

/// Lock order: `in_flight` before `record`. Every other lock is taken alone.
struct ManagerInner {
    config: CredentialConfig,
    record: Mutex<CredentialRecord>,
    in_flight: Mutex<Option<SharedRefresh>>,
    operation: RwLock<Option<Arc<dyn RefreshOperation>>>,
    callback: RwLock<Option<CredentialCallback>>,
}

/// Lifecycle manager for a single credential.
///
/// Cloning yields another handle to the same credential.
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<ManagerInner>,
}

/// Non-owning handle to a [`CredentialManager`].
///
/// Refresh operations that push new token material back into their own
/// manager hold this instead of a clone, otherwise the manager keeps itself
/// alive through its registered operation.
#[derive(Clone)]
pub struct WeakCredentialManager {
    inner: Weak<ManagerInner>,
}

impl WeakCredentialManager {
    /// The manager, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<CredentialManager> {
        self.inner.upgrade().map(|inner| CredentialManager { inner })
    }
}

impl fmt::Debug for WeakCredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCredentialManager")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn millis_until(expires_at_ms: i64, now_ms: i64) -> u64 {
    u64::try_from(expires_at_ms.saturating_sub(now_ms)).unwrap_or(0)
}

impl CredentialManager {
    /// Create a manager with an empty (`Unknown`) credential.
    #[must_use]
    pub fn new(config: CredentialConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                record: Mutex::new(CredentialRecord::default()),
                in_flight: Mutex::new(None),
                operation: RwLock::new(None),
                callback: RwLock::new(None),
            }),
        }
    }

    /// Builder: register the notification callback.
    #[must_use]
    pub fn with_callback(self, callback: CredentialCallback) -> Self {
        self.on_event(callback);
        self
    }

    /// Non-owning handle for use inside the refresh operation.
    #[must_use]
    pub fn downgrade(&self) -> WeakCredentialManager {
        WeakCredentialManager {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Register (or replace) the notification callback.
    pub fn on_event(&self, callback: CredentialCallback) {
        *self.inner.callback.write() = Some(callback);
    }

    /// Register the refresh operation.
    pub fn register_refresh_operation(&self, operation: Arc<dyn RefreshOperation>) {
        let replaced = self.inner.operation.write().replace(operation).is_some();
        if replaced {
            warn!("Refresh operation replaced");
        } else {
            debug!("Refresh operation registered");
        }
    }

    /// Register an async closure as the refresh operation.
    pub fn register_refresh_fn<F, Fut>(&self, refresh: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.register_refresh_operation(Arc::new(RefreshFn(refresh)));
    }

    /// Whether a refresh operation has been registered.
    #[must_use]
    pub fn has_refresh_operation(&self) -> bool {
        self.inner.operation.read().is_some()
    }

    /// The refresh policy in use.
    #[must_use]
    pub fn config(&self) -> &CredentialConfig {
        &self.inner.config
    }

    /// Replace the token material and recompute the state.
    ///
    /// `access_token` and `expires_at_ms` are always replaced, `None` included.
    /// `refresh_token` is only replaced when `Some`: providers commonly omit it
    /// from refresh responses while the old one stays valid. Use [`Self::clear`]
    /// to drop it. A refresh in flight keeps the state at `Refreshing`.
    pub fn update_token_info(
        &self,
        access_token: Option<String>,
        expires_at_ms: Option<i64>,
        refresh_token: Option<String>,
    ) {
        let state = {
            let mut record = self.inner.record.lock();
            record.access_token = access_token;
            record.expires_at_ms = expires_at_ms;
            if refresh_token.is_some() {
                record.refresh_token = refresh_token;
            }
            record.recompute(now_ms(), self.inner.config.pre_refresh_window_ms)
        };
        debug!(%state, ?expires_at_ms, "Token info updated");
    }

    /// Current lifecycle state.
    ///
    /// `Refreshing` and `RefreshFailed` are reported as stored; every other
    /// state is re-derived from the expiry.
    #[must_use]
    pub fn token_state(&self) -> TokenState {
        let mut record = self.inner.record.lock();
        match record.state {
            TokenState::Refreshing | TokenState::RefreshFailed => record.state,
            _ => record.recompute(now_ms(), self.inner.config.pre_refresh_window_ms),
        }
    }

    /// Milliseconds until expiry (zero once expired), `None` when unknown.
    #[must_use]
    pub fn remaining_valid_time(&self) -> Option<u64> {
        let expires_at_ms = self.inner.record.lock().expires_at_ms;
        expires_at_ms.map(|expiry| millis_until(expiry, now_ms()))
    }

    /// Whether the credential is inside the pre-refresh window.
    #[must_use]
    pub fn is_token_expiring_soon(&self) -> bool {
        self.expiry_state() == TokenState::ExpiringSoon
    }

    /// Whether the credential is past its expiry.
    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        self.expiry_state() == TokenState::Expired
    }

    /// Whether a refresh attempt is currently running.
    #[must_use]
    pub fn is_refresh_in_flight(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Error of the last exhausted refresh request.
    #[must_use]
    pub fn last_refresh_error(&self) -> Option<String> {
        self.inner.record.lock().last_refresh_error.clone()
    }

    /// Completion time of the last successful refresh.
    #[must_use]
    pub fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
        self.inner.record.lock().last_refresh_at
    }

    /// `Authorization` header value for the current access token.
    #[must_use]
    pub fn authorization_header(&self) -> Option<String> {
        self.inner
            .record
            .lock()
            .access_token
            .as_ref()
            .map(|token| format!("Bearer {token}"))
    }

    /// Diagnostic view without token material.
    #[must_use]
    pub fn snapshot(&self) -> CredentialSnapshot {
        let state = self.token_state();
        let refresh_in_flight = self.is_refresh_in_flight();
        let record = self.inner.record.lock();
        CredentialSnapshot {
            state,
            expires_at_ms: record.expires_at_ms,
            remaining_ms: record
                .expires_at_ms
                .map(|expiry| millis_until(expiry, now_ms())),
            has_access_token: record.access_token.is_some(),
            has_refresh_token: record.refresh_token.is_some(),
            last_refresh_at: record.last_refresh_at,
            last_refresh_error: record.last_refresh_error.clone(),
            refresh_in_flight,
        }
    }

    /// Forget all token material.
    pub fn clear(&self) {
        *self.inner.record.lock() = CredentialRecord::default();
        debug!("Credential cleared");
    }

    /// Report whether the credential is usable, refreshing it when needed.
    ///
    /// - `Valid`, `Unknown`: usable, nothing else happens.
    /// - `ExpiringSoon`: starts a refresh in the background and returns `true`
    ///   at once. Its outcome is only visible through notifications.
    /// - `Expired`: waits for a refresh and returns its outcome.
    /// - `Refreshing`: waits for the running attempt, `false` if there is none.
    pub async fn check_and_refresh_if_needed(&self) -> bool {
        let (state, expires_at_ms) = {
            let mut record = self.inner.record.lock();
            let state = record.recompute(now_ms(), self.inner.config.pre_refresh_window_ms);
            (state, record.expires_at_ms)
        };

        match state {
            TokenState::Valid | TokenState::Unknown => true,
            TokenState::ExpiringSoon => {
                let remaining_ms = expires_at_ms.map_or(0, |expiry| millis_until(expiry, now_ms()));
                info!(remaining_ms, "Token expiring soon, refreshing in background");
                self.inner
                    .emit(&CredentialEvent::TokenExpiringSoon { remaining_ms });
                if let Err(e) = self.inner.trigger_refresh() {
                    warn!(error = %e, "Preventive refresh not started");
                }
                true
            }
            TokenState::Expired => {
                warn!("Token expired, refreshing before use");
                self.inner.emit(&CredentialEvent::TokenExpired);
                match self.inner.trigger_refresh() {
                    Ok(attempt) => attempt.await,
                    Err(e) => {
                        error!(error = %e, "Cannot refresh expired token");
                        false
                    }
                }
            }
            TokenState::Refreshing => {
                let pending = self.inner.in_flight.lock().clone();
                match pending {
                    Some(attempt) => attempt.await,
                    None => false,
                }
            }
            TokenState::RefreshFailed => false,
        }
    }

    /// Refresh regardless of the current state and wait for the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::NoRefreshOperation`] if no refresh operation
    /// was registered. An unsuccessful refresh is `Ok(false)`.
    pub async fn force_refresh(&self) -> CredentialResult<bool> {
        let attempt = self.inner.trigger_refresh()?;
        Ok(attempt.await)
    }

    fn expiry_state(&self) -> TokenState {
        let expires_at_ms = self.inner.record.lock().expires_at_ms;
        TokenState::from_expiry(expires_at_ms, now_ms(), self.inner.config.pre_refresh_window_ms)
    }
}

impl ManagerInner {
    /// Join the running refresh or start a new one.
    ///
    /// The shared attempt is installed before this returns and removed by the
    /// attempt itself once it resolves. It is driven by a spawned task so it
    /// completes even if every waiter goes away.
    fn trigger_refresh(self: &Arc<Self>) -> CredentialResult<SharedRefresh> {
        let operation = self
            .operation
            .read()
            .clone()
            .ok_or(CredentialError::NoRefreshOperation)?;

        let mut slot = self.in_flight.lock();
        if let Some(pending) = slot.as_ref() {
            debug!("Joining in-flight token refresh");
            return Ok(pending.clone());
        }

        self.record.lock().state = TokenState::Refreshing;

        let inner = Arc::clone(self);
        let attempt = async move {
            let refreshed = inner.run_refresh(operation.as_ref()).await;
            inner.in_flight.lock().take();
            refreshed
        }
        .boxed()
        .shared();

        *slot = Some(attempt.clone());
        drop(slot);

        tokio::spawn(attempt.clone());
        Ok(attempt)
    }

    async fn run_refresh(&self, operation: &dyn RefreshOperation) -> bool {
        let attempts = self.config.max_refresh_retries.max(1);
        let expiry_before = self.record.lock().expires_at_ms;

        info!(
            attempts,
            timeout_ms = self.config.refresh_timeout_ms,
            "Token refresh started"
        );
        self.emit(&CredentialEvent::TokenRefreshStarted);

        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let error = match tokio::time::timeout(self.config.refresh_timeout(), operation.refresh())
                .await
            {
                Ok(true) => {
                    self.finish_success(attempt, expiry_before);
                    return true;
                }
                Ok(false) => "refresh operation reported failure".to_string(),
                Err(_) => format!(
                    "refresh attempt timed out after {}ms",
                    self.config.refresh_timeout_ms
                ),
            };

            let retries_remaining = attempts - attempt;
            warn!(attempt, retries_remaining, error = %error, "Token refresh attempt failed");
            self.emit(&CredentialEvent::TokenRefreshFailed {
                error: error.clone(),
                retries_remaining,
            });
            last_error = error;

            if retries_remaining > 0 {
                tokio::time::sleep(self.config.refresh_retry_interval()).await;
            }
        }

        {
            let mut record = self.record.lock();
            record.state = TokenState::RefreshFailed;
            record.last_refresh_error = Some(last_error.clone());
        }
        error!(attempts, error = %last_error, "Token refresh exhausted");
        false
    }

    fn finish_success(&self, attempt: u32, expiry_before: Option<i64>) {
        let now = Utc::now();
        let expires_at_ms = {
            let mut record = self.record.lock();
            record.state = TokenState::Valid;
            record.last_refresh_error = None;
            record.last_refresh_at = Some(now);
            match record.expires_at_ms {
                Some(expiry) if record.expires_at_ms != expiry_before => expiry,
                _ => now.timestamp_millis() + FALLBACK_VALIDITY_MS,
            }
        };
        info!(attempt, expires_at_ms, "Token refresh succeeded");
        self.emit(&CredentialEvent::TokenRefreshSuccess { expires_at_ms });
    }

    fn emit(&self, event: &CredentialEvent) {
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let has_refresh_operation = self.has_refresh_operation();
        let refresh_in_flight = self.is_refresh_in_flight();
        let record = self.inner.record.lock().clone();
        f.debug_struct("CredentialManager")
            .field("config", &self.inner.config)
            .field("record", &record)
            .field("has_refresh_operation", &has_refresh_operation)
            .field("refresh_in_flight", &refresh_in_flight)
            .finish_non_exhaustive()
    }
}
