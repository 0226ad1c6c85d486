//! Credential lifecycle notifications.

use std::sync::Arc;

/// Notification emitted by [`crate::CredentialManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialEvent {
    /// The credential entered the pre-refresh window.
    TokenExpiringSoon {
        /// Milliseconds left before expiry.
        remaining_ms: u64,
    },
    /// A shared refresh attempt started.
    TokenRefreshStarted,
    /// A refresh succeeded.
    TokenRefreshSuccess {
        /// New expiry (epoch milliseconds).
        expires_at_ms: i64,
    },
    /// A refresh attempt failed.
    TokenRefreshFailed {
        /// Failure description.
        error: String,
        /// Attempts left in this refresh request.
        retries_remaining: u32,
    },
    /// The credential is past its expiry.
    TokenExpired,
}

impl CredentialEvent {
    /// Stable snake_case name of the notification.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TokenExpiringSoon { .. } => "token_expiring_soon",
            Self::TokenRefreshStarted => "token_refresh_started",
            Self::TokenRefreshSuccess { .. } => "token_refresh_success",
            Self::TokenRefreshFailed { .. } => "token_refresh_failed",
            Self::TokenExpired => "token_expired",
        }
    }
}

/// Callback receiving credential notifications.
pub type CredentialCallback = Arc<dyn Fn(&CredentialEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            CredentialEvent::TokenExpiringSoon { remaining_ms: 1 }.kind(),
            "token_expiring_soon"
        );
        assert_eq!(CredentialEvent::TokenRefreshStarted.kind(), "token_refresh_started");
        assert_eq!(
            CredentialEvent::TokenRefreshFailed {
                error: String::new(),
                retries_remaining: 0,
            }
            .kind(),
            "token_refresh_failed"
        );
        assert_eq!(CredentialEvent::TokenExpired.kind(), "token_expired");
    }
}
