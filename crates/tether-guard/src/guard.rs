//! Protected / completed bookkeeping for side-effecting operations.

use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::OperationStatus;

#[derive(Debug, Default)]
struct GuardSets {
    protected: HashSet<String>,
    completed: HashSet<String>,
}

/// Registry of operations whose side effects are still committing.
///
/// An id is in at most one of the two sets. Every call takes a single lock,
/// so moves between the sets are atomic.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    sets: Mutex<GuardSets>,
}

/// One entry of a reconciled batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledOperation {
    /// Operation id.
    pub id: String,
    /// Status as reported by the executor.
    pub reported: OperationStatus,
    /// Status to act on.
    pub effective: OperationStatus,
}

impl InFlightGuard {
    /// Create an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as executing.
    ///
    /// Idempotent. Returns `false` if the id was already protected or has
    /// already completed (a completed id is never re-protected).
    pub fn protect(&self, id: &str) -> bool {
        let mut sets = self.sets.lock();
        if sets.completed.contains(id) {
            debug!(id, "Ignoring protect for completed operation");
            return false;
        }
        let added = sets.protected.insert(id.to_string());
        if added {
            trace!(id, "Operation protected");
        }
        added
    }

    /// Whether `id` is currently protected.
    #[must_use]
    pub fn is_protected(&self, id: &str) -> bool {
        self.sets.lock().protected.contains(id)
    }

    /// Whether `id` reached a terminal outcome.
    #[must_use]
    pub fn is_completed(&self, id: &str) -> bool {
        self.sets.lock().completed.contains(id)
    }

    /// Move `id` from protected to completed.
    ///
    /// Call once, when the operation reaches a genuine success or error.
    pub fn complete(&self, id: &str) {
        let mut sets = self.sets.lock();
        let was_protected = sets.protected.remove(id);
        sets.completed.insert(id.to_string());
        trace!(id, was_protected, "Operation completed");
    }

    /// Drop protection without marking `id` completed.
    ///
    /// Returns whether the id was protected.
    pub fn unprotect(&self, id: &str) -> bool {
        let removed = self.sets.lock().protected.remove(id);
        if removed {
            debug!(id, "Operation abandoned");
        }
        removed
    }

    /// Empty both sets. Session teardown only.
    pub fn clear(&self) {
        let mut sets = self.sets.lock();
        let (protected, completed) = (sets.protected.len(), sets.completed.len());
        sets.protected.clear();
        sets.completed.clear();
        debug!(protected, completed, "In-flight guard cleared");
    }

    /// Number of protected ids.
    #[must_use]
    pub fn protected_count(&self) -> usize {
        self.sets.lock().protected.len()
    }

    /// Number of completed ids.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.sets.lock().completed.len()
    }

    /// Status to act on for a reported one.
    ///
    /// A protected operation reported as cancelled is still committing its
    /// side effects and is treated as running.
    #[must_use]
    pub fn effective_status(&self, id: &str, reported: OperationStatus) -> OperationStatus {
        if reported == OperationStatus::Cancelled && self.is_protected(id) {
            debug!(id, "Cancelled report overridden for protected operation");
            OperationStatus::Running
        } else {
            reported
        }
    }

    /// Whether an operation reported with `status` should be treated as cancelled.
    #[must_use]
    pub fn is_effectively_cancelled(&self, id: &str, status: OperationStatus) -> bool {
        self.effective_status(id, status) == OperationStatus::Cancelled
    }

    /// Apply [`Self::effective_status`] to a batch of reports.
    pub fn reconcile<I, S>(&self, batch: I) -> Vec<ReconciledOperation>
    where
        I: IntoIterator<Item = (S, OperationStatus)>,
        S: Into<String>,
    {
        let sets = self.sets.lock();
        batch
            .into_iter()
            .map(|(id, reported)| {
                let id = id.into();
                let effective =
                    if reported == OperationStatus::Cancelled && sets.protected.contains(&id) {
                        OperationStatus::Running
                    } else {
                        reported
                    };
                ReconciledOperation {
                    id,
                    reported,
                    effective,
                }
            })
            .collect()
    }
}
