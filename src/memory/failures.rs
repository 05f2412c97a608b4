//! Failed-embedding side table.
//!
//! Process-scoped bookkeeping for memories whose embedding step failed
//! while their document write succeeded. The trait is the injection seam
//! for a durable backing; every compound transition executes under one
//! lock acquisition so concurrent store/update/reprocess calls on the
//! same id cannot interleave half-applied state.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::FailedEmbedding;

#[async_trait]
pub trait FailureTracker: Send + Sync {
    /// Insert or overwrite the record for a memory, retry count back to 0.
    /// Used by the initial store path.
    async fn reset(&self, record: FailedEmbedding);

    /// Insert at retry count 0, or bump an existing record and refresh its
    /// error and content snapshot. Used by update and reprocess failures.
    async fn record_failure(&self, memory_id: &str, content: &str, error: &str);

    /// Drop the record unconditionally. Returns whether one existed.
    async fn resolve(&self, memory_id: &str) -> bool;

    /// Drop the record only if its retry count still matches `seen_retries`.
    /// The compare half of reprocessing's check-and-set: a record that was
    /// re-failed concurrently stays tracked.
    async fn resolve_if(&self, memory_id: &str, seen_retries: u32) -> bool;

    /// Read-only snapshot for reprocessing and operational visibility.
    async fn snapshot(&self) -> Vec<FailedEmbedding>;

    /// Operator-initiated wipe.
    async fn clear(&self);
}

#[derive(Default)]
pub struct InMemoryFailureTracker {
    entries: Mutex<HashMap<String, FailedEmbedding>>,
}

impl InMemoryFailureTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FailureTracker for InMemoryFailureTracker {
    async fn reset(&self, record: FailedEmbedding) {
        let mut entries = self.entries.lock().await;
        entries.insert(record.memory_id.clone(), record);
    }

    async fn record_failure(&self, memory_id: &str, content: &str, error: &str) {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(memory_id) {
            Some(existing) => {
                existing.retry_count += 1;
                existing.error = error.to_string();
                existing.content = content.to_string();
                existing.timestamp = Utc::now();
            }
            None => {
                entries.insert(
                    memory_id.to_string(),
                    FailedEmbedding::new(memory_id, content, error),
                );
            }
        }
    }

    async fn resolve(&self, memory_id: &str) -> bool {
        self.entries.lock().await.remove(memory_id).is_some()
    }

    async fn resolve_if(&self, memory_id: &str, seen_retries: u32) -> bool {
        let mut entries = self.entries.lock().await;
        if entries
            .get(memory_id)
            .is_some_and(|record| record.retry_count == seen_retries)
        {
            entries.remove(memory_id);
            true
        } else {
            false
        }
    }

    async fn snapshot(&self) -> Vec<FailedEmbedding> {
        self.entries.lock().await.values().cloned().collect()
    }

    async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
