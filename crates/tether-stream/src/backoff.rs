//! Exponential backoff with symmetric jitter.

use std::time::Duration;

use rand::Rng;

use crate::ResilienceConfig;

/// Fraction of the un-jittered delay used as the jitter amplitude.
pub const JITTER_RATIO: f64 = 0.3;

/// Compute the backoff delay for a zero-based attempt with a random jitter sample.
///
/// `delay = min(max_backoff, max(0, initial * 2^attempt + jitter))` where the
/// jitter is uniformly distributed in `±30%` of the un-clamped delay.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, config: &ResilienceConfig) -> Duration {
    let unit: f64 = rand::rng().random_range(-1.0..=1.0);
    backoff_delay_with_jitter(attempt, config, unit)
}

/// Compute the backoff delay with a caller-supplied jitter sample.
///
/// `jitter_unit` is clamped to `[-1.0, 1.0]`; `0.0` yields the pure
/// exponential delay.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn backoff_delay_with_jitter(attempt: u32, config: &ResilienceConfig, jitter_unit: f64) -> Duration {
    let exp = attempt.min(30);
    let base = config.initial_backoff_ms.saturating_mul(1u64 << exp) as f64;
    let jitter = base * JITTER_RATIO * jitter_unit.clamp(-1.0, 1.0);
    let delay = (base + jitter).max(0.0).min(config.max_backoff_ms as f64);
    Duration::from_millis(delay as u64)
}

/// Milliseconds of a delay, saturating at `u64::MAX`.
#[must_use]
pub fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
