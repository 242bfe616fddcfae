//! Checkpoint persistence
//!
//! The store is the only shared mutable resource; it is written by the
//! engine's runners and nothing else.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::StoreError;
use crate::state::ThreadRecord;

/// Durable keyed storage of thread records
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Insert or replace the record for its thread id
    async fn save(&self, record: &ThreadRecord) -> Result<(), StoreError>;

    async fn load(&self, thread_id: &str) -> Result<Option<ThreadRecord>, StoreError>;

    /// Every record, most recently created first
    async fn list(&self) -> Result<Vec<ThreadRecord>, StoreError>;
}

/// In-process store; records are kept serialized so loads never alias live state
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, record: &ThreadRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        self.records()?.insert(record.thread_id.clone(), json);
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<ThreadRecord>, StoreError> {
        match self.records()?.get(thread_id) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<ThreadRecord>, StoreError> {
        let mut records = self
            .records()?
            .values()
            .map(|json| serde_json::from_str::<ThreadRecord>(json))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

/// Saves with bounded retries and exponential backoff
#[derive(Clone)]
pub struct Checkpointer {
    store: Arc<dyn CheckpointStore>,
    retries: u32,
    backoff: Duration,
}

impl Checkpointer {
    pub fn new(store: Arc<dyn CheckpointStore>, retries: u32, backoff: Duration) -> Self {
        Self {
            store,
            retries,
            backoff,
        }
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Save, retrying up to `retries` more times before giving up
    pub async fn save(&self, record: &ThreadRecord) -> Result<(), StoreError> {
        let mut delay = self.backoff;
        let mut attempt = 0;

        loop {
            match self.store.save(record).await {
                Ok(()) => {
                    tracing::debug!(
                        thread_id = %record.thread_id,
                        status = %record.status,
                        "Checkpoint saved"
                    );
                    return Ok(());
                }
                Err(e) if attempt >= self.retries => {
                    tracing::error!(
                        thread_id = %record.thread_id,
                        attempts = attempt + 1,
                        error = %e,
                        "Checkpoint failed"
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        thread_id = %record.thread_id,
                        attempt = attempt + 1,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Checkpoint failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
            }
        }
    }

    /// Single attempt, no retries
    pub async fn save_once(&self, record: &ThreadRecord) -> Result<(), StoreError> {
        self.store.save(record).await
    }
}
