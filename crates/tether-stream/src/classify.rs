//! Failure classification for caller-driven retry loops.
//!
//! Classification is advisory: the stream adapter re-raises every failure,
//! these helpers only tell the caller whether another attempt makes sense.

/// Transport-level phrases that mark a failure as transient.
const TRANSIENT_PHRASES: &[&str] = &[
    "fetch failed",
    "network",
    "timeout",
    "connection",
    "econnreset",
    "socket hang up",
];

/// HTTP status markers that mark a failure as transient.
const TRANSIENT_STATUS_MARKERS: &[&str] = &["429", "502", "503", "504"];

/// High-level classification of a stream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network/transport failure or retryable HTTP status.
    Transient,
    /// Anything else; must propagate for terminal handling.
    Terminal,
}

impl FailureClass {
    /// Returns true if the class permits a retry.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Classify a free-form failure message.
#[must_use]
pub fn classify_failure(message: &str) -> FailureClass {
    let lower = message.to_lowercase();

    if TRANSIENT_PHRASES.iter().any(|phrase| lower.contains(phrase))
        || TRANSIENT_STATUS_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
    {
        FailureClass::Transient
    } else {
        FailureClass::Terminal
    }
}

/// Returns true if a failure message (case-insensitive) describes a transient failure.
#[must_use]
pub fn is_retryable_error(message: &str) -> bool {
    classify_failure(message).is_retryable()
}
