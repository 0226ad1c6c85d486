//! Tether Guard - in-flight operation protection
//!
//! When a stream drops while side-effecting operations (tool calls, file
//! writes) are still executing, their executor may report them as cancelled.
//! [`InFlightGuard`] records which operations are still committing so that
//! such reports can be overridden when a batch is reconciled.
//!
//! ```rust
//! use tether_guard::{InFlightGuard, OperationStatus};
//!
//! let guard = InFlightGuard::new();
//! guard.protect("call-1");
//! assert!(!guard.is_effectively_cancelled("call-1", OperationStatus::Cancelled));
//! guard.complete("call-1");
//! assert!(guard.is_completed("call-1"));
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod guard;
mod status;

pub use guard::{InFlightGuard, ReconciledOperation};
pub use status::OperationStatus;
