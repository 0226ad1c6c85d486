//! Tether Stream - resilience primitives for long-lived streaming connections
//!
//! This crate provides:
//!
//! - **Connection monitor**: state machine plus heartbeat-based liveness check
//! - **Stream adapter**: single-attempt passthrough that drives the monitor
//! - **Failure classification**: transient vs terminal failure messages
//! - **Backoff**: exponential delay with ±30% jitter, cancelable waits
//! - **Retry driver**: caller-side retry loop with progress notifications
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tether_stream::{ConnectionMonitor, ResilienceConfig, ResilientStreamExt, RetryDriver};
//!
//! let config = ResilienceConfig::default();
//! let driver = RetryDriver::new(config.clone());
//!
//! let total = driver
//!     .run(|_attempt| async {
//!         let monitor = ConnectionMonitor::new(&config);
//!         let mut events = open_source().await?.resilient(monitor);
//!         let mut count = 0;
//!         while let Some(event) = events.next().await {
//!             event?;
//!             count += 1;
//!         }
//!         Ok::<_, StreamError>(count)
//!     })
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod adapter;
mod backoff;
mod classify;
mod config;
mod delay;
mod error;
mod event;
mod monitor;
mod retry;

pub use adapter::{ResilientStream, ResilientStreamExt};
pub use backoff::{JITTER_RATIO, backoff_delay_with_jitter, calculate_backoff_delay, duration_to_ms};
pub use classify::{FailureClass, classify_failure, is_retryable_error};
pub use config::{
    DEFAULT_HEARTBEAT_CHECK_INTERVAL_MS, DEFAULT_HEARTBEAT_TIMEOUT_MS, DEFAULT_INITIAL_BACKOFF_MS,
    DEFAULT_MAX_BACKOFF_MS, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_MS, ResilienceConfig,
};
pub use delay::cancelable_delay;
pub use error::{DelayCancelled, RetryError, StreamError, StreamResult};
pub use event::{ConnectionState, ResilienceCallback, ResilienceEvent};
pub use monitor::ConnectionMonitor;
pub use retry::{RetryDriver, retry_with_backoff};
