//! Caller-side retry loop around single-attempt operations.
//!
//! The stream adapter never retries. Callers that want "reconnecting, attempt
//! N of M" behaviour wrap each attempt (typically: open a source, adapt it,
//! drain it) in [`RetryDriver::run`], which applies the backoff and
//! retryability helpers and reports progress through [`ResilienceEvent`]s.

use std::fmt::{self, Display};
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    ConnectionMonitor, ResilienceCallback, ResilienceConfig, ResilienceEvent, RetryError,
    backoff_delay_with_jitter, calculate_backoff_delay, cancelable_delay, duration_to_ms,
    is_retryable_error,
};

/// Drives repeated attempts of an operation with exponential backoff.
#[derive(Clone)]
pub struct RetryDriver {
    config: ResilienceConfig,
    cancel: CancellationToken,
    callback: Option<ResilienceCallback>,
    monitor: Option<ConnectionMonitor>,
    jitter: bool,
}

impl RetryDriver {
    /// Create a driver for `config` with its own cancellation token.
    #[must_use]
    pub fn new(config: ResilienceConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            callback: None,
            monitor: None,
            jitter: true,
        }
    }

    /// Builder: share an external cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Builder: report retry progress to `callback`.
    #[must_use]
    pub fn with_callback(mut self, callback: ResilienceCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Builder: mark `monitor` as reconnecting before every retry.
    #[must_use]
    pub fn with_monitor(mut self, monitor: ConnectionMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Builder: enable/disable jitter on backoff delays.
    #[must_use]
    pub const fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Token cancelling any in-progress backoff wait.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The resilience configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Backoff before the retry following the zero-based failed `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.jitter {
            calculate_backoff_delay(attempt, &self.config)
        } else {
            backoff_delay_with_jitter(attempt, &self.config, 0.0)
        }
    }

    /// Run `operation` until it succeeds, fails terminally, exhausts
    /// `max_retries` or is cancelled.
    ///
    /// The operation receives the zero-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Terminal`] for non-retryable failures (or when
    /// auto-reconnect is disabled), [`RetryError::Exhausted`] when the retry
    /// budget is spent and [`RetryError::Cancelled`] when a backoff wait was
    /// cancelled.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_retries = self.config.max_retries;
        let mut attempt: u32 = 0;

        loop {
            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(attempt, "Reconnect succeeded");
                        self.emit(&ResilienceEvent::ReconnectSuccess { attempt });
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let message = error.to_string();
            if !self.config.auto_reconnect || !is_retryable_error(&message) {
                warn!(attempt, error = %message, "Non-retryable failure");
                if attempt > 0 {
                    self.emit(&ResilienceEvent::ReconnectFailed { error: message });
                }
                return Err(RetryError::Terminal(error));
            }

            if attempt >= max_retries {
                warn!(attempts = attempt + 1, error = %message, "Retries exhausted");
                self.emit(&ResilienceEvent::ReconnectFailed { error: message });
                return Err(RetryError::Exhausted {
                    attempts: attempt + 1,
                    last: error,
                });
            }

            let delay = self.delay_for(attempt);
            attempt += 1;
            let delay_ms = duration_to_ms(delay);
            info!(attempt, max_retries, delay_ms, error = %message, "Retrying after backoff");
            self.emit(&ResilienceEvent::RetryAttempt {
                attempt,
                max_retries,
                delay_ms,
            });
            if let Some(monitor) = &self.monitor {
                monitor.mark_reconnecting();
            }

            if cancelable_delay(delay, &self.cancel).await.is_err() {
                info!(attempt, "Retry loop cancelled");
                return Err(RetryError::Cancelled {
                    attempts: attempt,
                    last: error,
                });
            }
        }
    }

    fn emit(&self, event: &ResilienceEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

impl fmt::Debug for RetryDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryDriver")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("has_callback", &self.callback.is_some())
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

/// Run `operation` with retries using `config` and `cancel`, without notifications.
///
/// # Errors
///
/// See [`RetryDriver::run`].
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &ResilienceConfig,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryDriver::new(config.clone())
        .with_cancellation(cancel.clone())
        .run(operation)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    use crate::{ConnectionState, StreamError};

    fn config(max_retries: u32) -> ResilienceConfig {
        ResilienceConfig::default()
            .with_max_retries(max_retries)
            .with_initial_backoff_ms(100)
            .with_max_backoff_ms(1_000)
    }

    fn recorder() -> (ResilienceCallback, Arc<Mutex<Vec<ResilienceEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: ResilienceCallback = Arc::new(move |event: &ResilienceEvent| {
            sink.lock().push(event.clone());
        });
        (callback, events)
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_emits_nothing() {
        let (callback, events) = recorder();
        let driver = RetryDriver::new(config(3)).with_callback(callback);
        let result: Result<u8, RetryError<StreamError>> = driver.run(|_| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert!(events.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_then_succeeds() {
        let (callback, events) = recorder();
        let driver = RetryDriver::new(config(3))
            .with_callback(callback)
            .with_jitter(false);
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = driver
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(StreamError::ConnectionFailed("ECONNRESET".into()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(300));
        assert_eq!(
            *events.lock(),
            vec![
                ResilienceEvent::RetryAttempt {
                    attempt: 1,
                    max_retries: 3,
                    delay_ms: 100,
                },
                ResilienceEvent::RetryAttempt {
                    attempt: 2,
                    max_retries: 3,
                    delay_ms: 200,
                },
                ResilienceEvent::ReconnectSuccess { attempt: 2 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&config(3), &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(StreamError::HttpError {
                    status: 401,
                    message: "unauthorized".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Terminal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_reconnect_disabled_fails_fast() {
        let driver = RetryDriver::new(config(3).with_auto_reconnect(false));
        let result: Result<(), _> = driver
            .run(|_| async { Err(StreamError::ConnectionFailed("socket hang up".into())) })
            .await;
        assert!(matches!(result, Err(RetryError::Terminal(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_attempts_and_failure_event() {
        let (callback, events) = recorder();
        let driver = RetryDriver::new(config(2)).with_callback(callback);
        let result: Result<(), _> = driver
            .run(|_| async { Err(StreamError::Upstream("fetch failed: network error".into())) })
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last.to_string(), "fetch failed: network error");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let events = events.lock();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events.last(),
            Some(&ResilienceEvent::ReconnectFailed {
                error: "fetch failed: network error".into(),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_loop() {
        let cancel = CancellationToken::new();
        let driver = RetryDriver::new(config(5).with_initial_backoff_ms(10_000).with_max_backoff_ms(60_000))
            .with_cancellation(cancel.clone());
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = driver
            .run(|_| async { Err(StreamError::Timeout(Duration::from_secs(1))) })
            .await;
        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn marks_monitor_reconnecting_between_attempts() {
        let monitor = ConnectionMonitor::new(&ResilienceConfig::default());
        let driver = RetryDriver::new(config(1)).with_monitor(monitor.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observed = Arc::clone(&seen);
        let observer = monitor.clone();

        let result: Result<(), _> = driver
            .run(|_| {
                observed.lock().push(observer.state());
                async { Err(StreamError::ConnectionClosed { reason: "reset".into() }) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 2, .. })));
        assert_eq!(
            *seen.lock(),
            vec![ConnectionState::Disconnected, ConnectionState::Reconnecting]
        );
    }
}
