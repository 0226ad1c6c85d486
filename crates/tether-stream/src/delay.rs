//! Cancelable wait used between retry attempts.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::DelayCancelled;

/// Wait for `duration` unless `cancel` fires first.
///
/// Returns immediately with [`DelayCancelled::AlreadyCancelled`] when the token
/// is already cancelled. The timer is dropped on every exit path.
///
/// # Errors
///
/// Returns [`DelayCancelled`] when the token is or becomes cancelled.
pub async fn cancelable_delay(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), DelayCancelled> {
    if cancel.is_cancelled() {
        return Err(DelayCancelled::AlreadyCancelled);
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DelayCancelled::CancelledWhileWaiting),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn resolves_after_duration() {
        let cancel = CancellationToken::new();
        let started = Instant::now();
        cancelable_delay(Duration::from_millis(500), &cancel)
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_rejects_without_waiting() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let started = Instant::now();
        let result = cancelable_delay(Duration::from_secs(60), &cancel).await;
        assert_eq!(result, Err(DelayCancelled::AlreadyCancelled));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_while_waiting_rejects() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = cancelable_delay(Duration::from_secs(60), &cancel).await;
        assert_eq!(result, Err(DelayCancelled::CancelledWhileWaiting));
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
