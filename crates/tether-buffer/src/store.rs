//! Persistence interface for buffered messages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Kind of a persisted message record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Plain text content.
    Text,
}

/// A persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Record id.
    pub id: String,
    /// Owning conversation.
    pub conversation_id: String,
    /// Stable id of the message across streamed chunks.
    pub logical_message_id: String,
    /// Record kind.
    pub kind: RecordKind,
    /// Full content at the time of the write.
    pub content: String,
}

/// Durable storage the buffer flushes into.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Look up the record for a logical message.
    async fn find_by_logical_id(
        &self,
        conversation_id: &str,
        logical_message_id: &str,
        kind: RecordKind,
    ) -> Result<Option<MessageRecord>, StoreError>;

    /// Insert a new record.
    async fn insert(&self, record: MessageRecord) -> Result<(), StoreError>;

    /// Replace the record stored under `id`.
    async fn update(&self, id: &str, record: MessageRecord) -> Result<(), StoreError>;
}

/// In-process [`MessageStore`] with write counters.
///
/// Can be switched into a failing mode to exercise error paths.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    records: Mutex<HashMap<String, MessageRecord>>,
    inserts: AtomicUsize,
    updates: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryMessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful inserts.
    #[must_use]
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Number of successful updates.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Total successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.insert_count() + self.update_count()
    }

    /// Stored content of a logical message.
    #[must_use]
    pub fn content_of(&self, conversation_id: &str, logical_message_id: &str) -> Option<String> {
        self.records
            .lock()
            .values()
            .find(|r| r.conversation_id == conversation_id && r.logical_message_id == logical_message_id)
            .map(|r| r.content.clone())
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err("message store unavailable".into())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn find_by_logical_id(
        &self,
        conversation_id: &str,
        logical_message_id: &str,
        kind: RecordKind,
    ) -> Result<Option<MessageRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .records
            .lock()
            .values()
            .find(|r| {
                r.kind == kind
                    && r.conversation_id == conversation_id
                    && r.logical_message_id == logical_message_id
            })
            .cloned())
    }

    async fn insert(&self, record: MessageRecord) -> Result<(), StoreError> {
        self.check_available()?;
        let mut records = self.records.lock();
        if records.contains_key(&record.id) {
            return Err(format!("record {} already exists", record.id).into());
        }
        records.insert(record.id.clone(), record);
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, id: &str, record: MessageRecord) -> Result<(), StoreError> {
        self.check_available()?;
        let mut records = self.records.lock();
        let Some(existing) = records.get_mut(id) else {
            return Err(format!("record {id} not found").into());
        };
        *existing = record;
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
