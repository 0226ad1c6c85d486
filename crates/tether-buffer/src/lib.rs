//! Tether Buffer - write coalescing for streamed message content
//!
//! Streaming output arrives as many small deltas. [`StreamBuffer`] keeps one
//! entry per logical message and writes it to a [`MessageStore`] only every
//! `chunk_batch_size` chunks or `update_interval_ms` of staleness, whichever
//! comes first.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_buffer::{BufferConfig, ChunkAppend, FlushMode, InMemoryMessageStore, StreamBuffer};
//!
//! let buffer = StreamBuffer::new(Arc::new(InMemoryMessageStore::new()), BufferConfig::default());
//! while let Some(delta) = deltas.next().await {
//!     buffer.append(ChunkAppend::accumulate(&record_id, &message_id, &conversation_id, delta)).await;
//! }
//! buffer.flush(&message_id, FlushMode::Clear).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod buffer;
mod config;
mod error;
mod store;

pub use buffer::{BufferMode, ChunkAppend, FlushMode, StreamBuffer};
pub use config::{BufferConfig, DEFAULT_CHUNK_BATCH_SIZE, DEFAULT_UPDATE_INTERVAL_MS};
pub use error::{BufferError, BufferResult, StoreError};
pub use store::{InMemoryMessageStore, MessageRecord, MessageStore, RecordKind};
