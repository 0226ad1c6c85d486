//! Tether Credential - lifecycle policy for an externally issued access token
//!
//! This crate does not talk to any identity provider. It tracks one
//! credential's expiry and decides when the caller-supplied refresh operation
//! runs:
//!
//! - **Preventive refresh**: inside the pre-refresh window, in the background
//! - **Reactive refresh**: once expired, blocking the caller
//! - **Single-flight**: concurrent refresh requests share one attempt
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tether_credential::{CredentialConfig, CredentialManager};
//!
//! let credentials = CredentialManager::new(CredentialConfig::default());
//! // A weak handle: a clone would keep the manager alive through its own operation.
//! let handle = credentials.downgrade();
//! credentials.register_refresh_fn(move || {
//!     let handle = handle.clone();
//!     async move {
//!         let Some(credentials) = handle.upgrade() else {
//!             return false;
//!         };
//!         match provider.refresh().await {
//!             Ok(tokens) => {
//!                 credentials.update_token_info(Some(tokens.access), Some(tokens.expires_at_ms), tokens.refresh);
//!                 true
//!             }
//!             Err(_) => false,
//!         }
//!     }
//! });
//!
//! if credentials.check_and_refresh_if_needed().await {
//!     // safe to issue the request
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod event;
mod manager;
mod state;

pub use config::{
    CredentialConfig, DEFAULT_MAX_REFRESH_RETRIES, DEFAULT_PRE_REFRESH_WINDOW_MS,
    DEFAULT_REFRESH_RETRY_INTERVAL_MS, DEFAULT_REFRESH_TIMEOUT_MS,
};
pub use error::{CredentialError, CredentialResult};
pub use event::{CredentialCallback, CredentialEvent};
pub use manager::{CredentialManager, RefreshOperation, WeakCredentialManager};
pub use state::{CredentialSnapshot, TokenState};
