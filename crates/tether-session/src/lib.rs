//! Tether Session - wiring for a long-lived streamed conversation
//!
//! Combines the building blocks of the other tether crates for one session:
//!
//! - [`tether_stream`]: liveness monitor, stream adapter, retry driver
//! - [`tether_credential`]: preventive and single-flight token refresh
//! - [`tether_guard`]: protection of in-flight side-effecting operations
//! - [`tether_buffer`]: coalesced persistence of streamed text
//!
//! plus TOML configuration and tracing setup.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_session::{Session, SessionConfig, init_tracing};
//!
//! let config = SessionConfig::from_toml_file("tether.toml")?;
//! init_tracing(&config.logging);
//!
//! let session = Session::new(config, Arc::new(MyStore::connect().await?))?;
//! session.credentials().register_refresh_fn(refresh_token);
//!
//! let reply = session
//!     .run_with_retry(|_attempt| async {
//!         session.credentials().check_and_refresh_if_needed().await;
//!         let mut events = session.adapt(open_stream().await?);
//!         while let Some(event) = events.next().await {
//!             handle(event?).await;
//!         }
//!         Ok::<_, StreamError>(())
//!     })
//!     .await;
//! session.shutdown().await;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod session;
mod telemetry;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use session::{Session, default_guard};
pub use telemetry::{LogConfig, LogFormat, init_tracing, try_init_tracing};

pub use tether_buffer as buffer;
pub use tether_credential as credential;
pub use tether_guard as guard;
pub use tether_stream as stream;
