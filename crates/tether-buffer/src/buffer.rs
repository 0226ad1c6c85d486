//! Write-coalescing buffer for streamed message content.
//!
//! Each logical message gets one entry holding its accumulated content. An
//! append flushes straight away when the chunk count hits the batch size or
//! the last flush is older than the update interval; otherwise it (re)schedules
//! a single flush one interval later.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::{
    BufferConfig, BufferError, BufferResult, MessageRecord, MessageStore, RecordKind, StoreError,
};

/// How a chunk combines with the content buffered so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferMode {
    /// Append the chunk.
    Accumulate,
    /// Replace the content with the chunk.
    Replace,
}

/// What an explicit flush does with the entry afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Keep buffering into the entry.
    Keep,
    /// Drop the entry once the flush succeeded.
    Clear,
}

/// One streamed chunk for a logical message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkAppend {
    /// Id of the persisted record.
    pub entry_id: String,
    /// Stable id of the message across chunks; keys the buffer entry.
    pub logical_message_id: String,
    /// Owning conversation.
    pub conversation_id: String,
    /// The delta (or full replacement).
    pub chunk: String,
    /// Combination mode; only the first chunk of an entry decides it.
    pub mode: BufferMode,
}

impl ChunkAppend {
    /// Build an accumulating chunk.
    pub fn accumulate(
        entry_id: impl Into<String>,
        logical_message_id: impl Into<String>,
        conversation_id: impl Into<String>,
        chunk: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            logical_message_id: logical_message_id.into(),
            conversation_id: conversation_id.into(),
            chunk: chunk.into(),
            mode: BufferMode::Accumulate,
        }
    }

    /// Builder: switch to replace mode.
    #[must_use]
    pub const fn replacing(mut self) -> Self {
        self.mode = BufferMode::Replace;
        self
    }
}

struct BufferEntry {
    entry_id: String,
    conversation_id: String,
    logical_message_id: String,
    content: String,
    chunk_count: u64,
    mode: BufferMode,
    last_flush_at: Instant,
    pending_flush: Option<JoinHandle<()>>,
}

impl BufferEntry {
    fn new(first: &ChunkAppend) -> Self {
        Self {
            entry_id: first.entry_id.clone(),
            conversation_id: first.conversation_id.clone(),
            logical_message_id: first.logical_message_id.clone(),
            content: String::new(),
            chunk_count: 0,
            mode: first.mode,
            last_flush_at: Instant::now(),
            pending_flush: None,
        }
    }

    fn apply(&mut self, chunk: &str) {
        match self.mode {
            BufferMode::Accumulate => self.content.push_str(chunk),
            BufferMode::Replace => {
                self.content.clear();
                self.content.push_str(chunk);
            }
        }
        self.chunk_count += 1;
    }

    fn cancel_pending_flush(&mut self) {
        if let Some(handle) = self.pending_flush.take() {
            handle.abort();
        }
    }

    fn record(&self, id: String) -> MessageRecord {
        MessageRecord {
            id,
            conversation_id: self.conversation_id.clone(),
            logical_message_id: self.logical_message_id.clone(),
            kind: RecordKind::Text,
            content: self.content.clone(),
        }
    }
}

type SharedEntry = Arc<AsyncMutex<BufferEntry>>;

struct BufferInner {
    config: BufferConfig,
    store: Arc<dyn MessageStore>,
    entries: Mutex<HashMap<String, SharedEntry>>,
}

/// Coalesces streamed chunks into batched writes to a [`MessageStore`].
///
/// Appends to one logical message are serialized; different messages never
/// wait on each other.
#[derive(Clone)]
pub struct StreamBuffer {
    inner: Arc<BufferInner>,
}

impl StreamBuffer {
    /// Create a buffer writing into `store`.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, config: BufferConfig) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                config,
                store,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The thresholds in use.
    #[must_use]
    pub fn config(&self) -> &BufferConfig {
        &self.inner.config
    }

    /// Apply a chunk and flush or schedule a flush.
    ///
    /// Store failures are logged; the content stays buffered for the next flush.
    pub async fn append(&self, append: ChunkAppend) {
        let entry = {
            let mut entries = self.inner.entries.lock();
            Arc::clone(
                entries
                    .entry(append.logical_message_id.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(BufferEntry::new(&append)))),
            )
        };

        let mut guard = entry.lock().await;
        if guard.mode != append.mode {
            debug!(
                logical_message_id = %append.logical_message_id,
                entry_mode = ?guard.mode,
                chunk_mode = ?append.mode,
                "Chunk mode ignored, entry mode is fixed"
            );
        }
        guard.apply(&append.chunk);
        guard.cancel_pending_flush();

        let batch_size = self.inner.config.chunk_batch_size.max(1);
        let interval = self.inner.config.update_interval();
        let batch_full = guard.chunk_count % batch_size == 0;
        let stale = guard.last_flush_at.elapsed() > interval;

        if batch_full || stale {
            trace!(
                logical_message_id = %append.logical_message_id,
                chunk_count = guard.chunk_count,
                batch_full,
                stale,
                "Flushing buffer entry"
            );
            if let Err(e) = self.inner.flush_entry(&mut guard).await {
                warn!(
                    logical_message_id = %append.logical_message_id,
                    error = %e,
                    "Buffer flush failed, content kept"
                );
            }
        } else {
            guard.pending_flush = Some(self.inner.schedule_flush(Arc::clone(&entry)));
        }
    }

    /// Flush one entry now.
    ///
    /// With [`FlushMode::Clear`] the entry is removed after a successful write.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::UnknownEntry`] if nothing is buffered for the id
    /// and [`BufferError::Store`] if the write failed (the entry is kept).
    pub async fn flush(&self, logical_message_id: &str, mode: FlushMode) -> BufferResult<()> {
        let entry = self
            .inner
            .entry(logical_message_id)
            .ok_or_else(|| BufferError::UnknownEntry(logical_message_id.to_string()))?;

        let mut guard = entry.lock().await;
        guard.cancel_pending_flush();
        self.inner
            .flush_entry(&mut guard)
            .await
            .map_err(BufferError::Store)?;

        if mode == FlushMode::Clear {
            self.inner.entries.lock().remove(logical_message_id);
            debug!(logical_message_id, "Buffer entry cleared");
        }
        Ok(())
    }

    /// Flush every entry, keeping them. Returns the number of successful flushes.
    pub async fn flush_all(&self) -> usize {
        let entries: Vec<(String, SharedEntry)> = self
            .inner
            .entries
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();

        let mut flushed = 0;
        for (logical_message_id, entry) in entries {
            let mut guard = entry.lock().await;
            guard.cancel_pending_flush();
            match self.inner.flush_entry(&mut guard).await {
                Ok(()) => flushed += 1,
                Err(e) => warn!(%logical_message_id, error = %e, "Buffer flush failed, content kept"),
            }
        }
        flushed
    }

    /// Drop an entry without writing it. Returns whether it existed.
    pub async fn discard(&self, logical_message_id: &str) -> bool {
        let Some(entry) = self.inner.entries.lock().remove(logical_message_id) else {
            return false;
        };
        entry.lock().await.cancel_pending_flush();
        debug!(logical_message_id, "Buffer entry discarded");
        true
    }

    /// Buffered content of a logical message.
    pub async fn content(&self, logical_message_id: &str) -> Option<String> {
        let entry = self.inner.entry(logical_message_id)?;
        let content = entry.lock().await.content.clone();
        Some(content)
    }

    /// Number of live entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.inner.entries.lock().len()
    }
}

impl BufferInner {
    fn entry(&self, logical_message_id: &str) -> Option<SharedEntry> {
        self.entries.lock().get(logical_message_id).map(Arc::clone)
    }

    fn schedule_flush(self: &Arc<Self>, entry: SharedEntry) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        let delay = self.config.update_interval();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut guard = entry.lock().await;
            guard.pending_flush = None;
            if let Err(e) = inner.flush_entry(&mut guard).await {
                warn!(
                    logical_message_id = %guard.logical_message_id,
                    error = %e,
                    "Scheduled buffer flush failed, content kept"
                );
            }
        })
    }

    /// Write the entry's content, updating the existing record if there is one.
    async fn flush_entry(&self, entry: &mut BufferEntry) -> Result<(), StoreError> {
        let existing = self
            .store
            .find_by_logical_id(
                &entry.conversation_id,
                &entry.logical_message_id,
                RecordKind::Text,
            )
            .await?;

        match existing {
            Some(record) => {
                let id = record.id;
                self.store.update(&id, entry.record(id.clone())).await?;
            }
            None => {
                self.store.insert(entry.record(entry.entry_id.clone())).await?;
            }
        }

        entry.last_flush_at = Instant::now();
        debug!(
            logical_message_id = %entry.logical_message_id,
            chunk_count = entry.chunk_count,
            bytes = entry.content.len(),
            "Buffer entry flushed"
        );
        Ok(())
    }
}

impl fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("config", &self.inner.config)
            .field("entries", &self.entry_count())
            .finish_non_exhaustive()
    }
}
