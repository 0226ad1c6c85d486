//! Credential record and its lifecycle state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// More than the pre-refresh window remains.
    Valid,
    /// Inside the pre-refresh window but not yet expired.
    ExpiringSoon,
    /// Past the expiry time.
    Expired,
    /// A refresh attempt is in flight. Not derivable from expiry.
    Refreshing,
    /// The last refresh request exhausted its attempts.
    RefreshFailed,
    /// No expiry known.
    #[default]
    Unknown,
}

impl TokenState {
    /// State implied by the expiry alone.
    ///
    /// Never yields `Refreshing` or `RefreshFailed`; those are set only by the
    /// refresh machinery.
    #[must_use]
    pub fn from_expiry(expires_at_ms: Option<i64>, now_ms: i64, window_ms: u64) -> Self {
        let Some(expires_at) = expires_at_ms else {
            return Self::Unknown;
        };
        let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
        if now_ms >= expires_at {
            Self::Expired
        } else if now_ms >= expires_at.saturating_sub(window) {
            Self::ExpiringSoon
        } else {
            Self::Valid
        }
    }

    /// Whether recomputation from expiry must leave this state alone.
    #[must_use]
    pub const fn is_sticky(self) -> bool {
        matches!(self, Self::Refreshing)
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::ExpiringSoon => write!(f, "expiring_soon"),
            Self::Expired => write!(f, "expired"),
            Self::Refreshing => write!(f, "refreshing"),
            Self::RefreshFailed => write!(f, "refresh_failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Current token material and refresh bookkeeping for one credential.
#[derive(Clone, Default)]
pub(crate) struct CredentialRecord {
    pub(crate) access_token: Option<String>,
    pub(crate) expires_at_ms: Option<i64>,
    pub(crate) refresh_token: Option<String>,
    pub(crate) state: TokenState,
    pub(crate) last_refresh_at: Option<DateTime<Utc>>,
    pub(crate) last_refresh_error: Option<String>,
}

impl CredentialRecord {
    /// Recompute the state from expiry unless it is sticky.
    pub(crate) fn recompute(&mut self, now_ms: i64, window_ms: u64) -> TokenState {
        if !self.state.is_sticky() {
            self.state = TokenState::from_expiry(self.expires_at_ms, now_ms, window_ms);
        }
        self.state
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at_ms", &self.expires_at_ms)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("state", &self.state)
            .field("last_refresh_at", &self.last_refresh_at)
            .field("last_refresh_error", &self.last_refresh_error)
            .finish()
    }
}

/// Diagnostic view of a credential without token material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialSnapshot {
    /// Lifecycle state.
    pub state: TokenState,
    /// Expiry as epoch milliseconds, if known.
    pub expires_at_ms: Option<i64>,
    /// Milliseconds until expiry, if known.
    pub remaining_ms: Option<u64>,
    /// Whether an access token is held.
    pub has_access_token: bool,
    /// Whether a refresh token is held.
    pub has_refresh_token: bool,
    /// Completion time of the last successful refresh.
    pub last_refresh_at: Option<DateTime<Utc>>,
    /// Error of the last failed refresh request.
    pub last_refresh_error: Option<String>,
    /// Whether a refresh attempt is currently running.
    pub refresh_in_flight: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 300_000;
    const EXPIRY: i64 = 1_700_000_000_000;

    #[test]
    fn valid_before_window() {
        let now = EXPIRY - 300_001;
        assert_eq!(TokenState::from_expiry(Some(EXPIRY), now, WINDOW), TokenState::Valid);
    }

    #[test]
    fn expiring_soon_from_window_start() {
        let start = EXPIRY - 300_000;
        assert_eq!(
            TokenState::from_expiry(Some(EXPIRY), start, WINDOW),
            TokenState::ExpiringSoon
        );
        assert_eq!(
            TokenState::from_expiry(Some(EXPIRY), EXPIRY - 1, WINDOW),
            TokenState::ExpiringSoon
        );
    }

    #[test]
    fn expired_at_and_after_expiry() {
        assert_eq!(TokenState::from_expiry(Some(EXPIRY), EXPIRY, WINDOW), TokenState::Expired);
        assert_eq!(
            TokenState::from_expiry(Some(EXPIRY), EXPIRY + 10, WINDOW),
            TokenState::Expired
        );
    }

    #[test]
    fn unknown_without_expiry() {
        assert_eq!(TokenState::from_expiry(None, EXPIRY, WINDOW), TokenState::Unknown);
    }

    #[test]
    fn huge_window_saturates() {
        assert_eq!(
            TokenState::from_expiry(Some(EXPIRY), 0, u64::MAX),
            TokenState::ExpiringSoon
        );
    }

    #[test]
    fn refreshing_is_sticky_on_recompute() {
        let mut record = CredentialRecord {
            expires_at_ms: Some(EXPIRY),
            state: TokenState::Refreshing,
            ..CredentialRecord::default()
        };
        assert_eq!(record.recompute(EXPIRY + 1, WINDOW), TokenState::Refreshing);

        record.state = TokenState::RefreshFailed;
        assert_eq!(record.recompute(EXPIRY + 1, WINDOW), TokenState::Expired);
    }

    #[test]
    fn debug_redacts_tokens() {
        let record = CredentialRecord {
            access_token: Some("secret-access".into()),
            refresh_token: Some("secret-refresh".into()),
            ..CredentialRecord::default()
        };
        let debug = format!("{record:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TokenState::ExpiringSoon).unwrap(),
            "\"expiring_soon\""
        );
        assert_eq!(TokenState::RefreshFailed.to_string(), "refresh_failed");
    }
}
