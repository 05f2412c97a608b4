//! Memory Store - failure-tolerant persistence and similarity retrieval.
//!
//! Orchestrates the embedding provider and the document store. The one
//! rule everything here bends around: a failed embedding must never lose
//! the write. Unembedded documents are persisted with an empty vector and
//! tracked in the failure table until an explicit reprocess succeeds.

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    snippet, BatchFailure, BatchOutcome, FailedEmbedding, FailureTracker,
    InMemoryFailureTracker, Memory, MemoryPatch, MemoryTag, ReprocessOutcome, ScoredMemory,
    SearchQuery,
};
use crate::config::MemoryConfig;
use crate::docstore::{DocumentStore, MetadataMap};
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, MemoryResult};

/// Candidate-pool multiplier for the client-side recency sort.
const RECENCY_SCAN_FACTOR: usize = 10;

#[derive(Clone)]
pub struct MemoryStore {
    docs: Arc<dyn DocumentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    failures: Arc<dyn FailureTracker>,
    collection: String,
    default_search_limit: usize,
}

impl MemoryStore {
    /// Create a store bound to the configured collection, creating it if
    /// needed. Uses the in-memory failure tracker unless one is injected
    /// via [`Self::with_failure_tracker`].
    pub async fn new(
        docs: Arc<dyn DocumentStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &MemoryConfig,
    ) -> MemoryResult<Self> {
        docs.get_or_create_collection(&config.collection).await?;
        Ok(Self {
            docs,
            embedder,
            failures: Arc::new(InMemoryFailureTracker::new()),
            collection: config.collection.clone(),
            default_search_limit: config.default_search_limit,
        })
    }

    pub fn with_failure_tracker(mut self, failures: Arc<dyn FailureTracker>) -> Self {
        self.failures = failures;
        self
    }

    /// Persist a memory, assigning an id if absent. The embedding step is
    /// attempted, but its failure is absorbed: the document is written with
    /// an empty vector and the failure tracked for later reprocessing. Only
    /// document-store failures propagate.
    pub async fn store_memory(&self, mut memory: Memory) -> MemoryResult<String> {
        if memory.content.trim().is_empty() {
            return Err(MemoryError::Validation("memory content must be non-empty".to_string()));
        }
        if memory.id.is_empty() {
            memory.id = Uuid::new_v4().to_string();
        }

        match self.embedder.generate_embedding(&memory.content).await {
            Ok(vector) => {
                memory.embedding = Some(vector);
                self.failures.resolve(&memory.id).await;
            }
            Err(err) => {
                warn!(memory_id = %memory.id, error = %err, "embedding failed; storing without vector");
                memory.embedding = None;
                self.failures
                    .reset(FailedEmbedding::new(&memory.id, &memory.content, err.to_string()))
                    .await;
            }
        }

        self.docs.add_documents(&self.collection, &[memory.to_document()]).await?;
        debug!(memory_id = %memory.id, kind = memory.kind.tag().as_str(), "memory stored");
        Ok(memory.id)
    }

    /// Store a batch with per-item isolation: one item's document-write
    /// failure never aborts the rest, and embedding failures count as
    /// successes per the policy above.
    pub async fn store_memories(&self, memories: Vec<Memory>) -> BatchOutcome {
        let mut outcome = BatchOutcome { total_processed: memories.len(), ..Default::default() };
        for mut memory in memories {
            if memory.id.is_empty() {
                memory.id = Uuid::new_v4().to_string();
            }
            let id = memory.id.clone();
            match self.store_memory(memory).await {
                Ok(id) => outcome.successful.push(id),
                Err(err) => {
                    warn!(memory_id = %id, error = %err, "batch item failed");
                    outcome.failed.push(BatchFailure { id, error: err.to_string() });
                }
            }
        }
        outcome
    }

    /// Fetch by id; a missing id is `None`, never an error.
    pub async fn get_memory(&self, id: &str) -> MemoryResult<Option<Memory>> {
        let mut memories = self.get_memories(&[id.to_string()]).await?;
        Ok(memories.pop().flatten())
    }

    /// Batch fetch preserving the order of `ids`.
    pub async fn get_memories(&self, ids: &[String]) -> MemoryResult<Vec<Option<Memory>>> {
        let documents = self.docs.get_documents(&self.collection, ids).await?;
        let mut memories = Vec::with_capacity(documents.len());
        for doc in documents {
            memories.push(match doc {
                Some(doc) => Some(Memory::from_document(&doc)?),
                None => None,
            });
        }
        Ok(memories)
    }

    /// Merge a partial update into an existing memory. A content change
    /// re-embeds under the same failure-tolerant policy as storing.
    pub async fn update_memory(&self, id: &str, patch: MemoryPatch) -> MemoryResult<Memory> {
        let existing = self
            .get_memory(id)
            .await?
            .ok_or_else(|| MemoryError::NotFound(format!("memory {id}")))?;

        let mut updated = existing.clone();
        if let Some(content) = patch.content {
            updated.content = content;
        }
        if let Some(kind) = patch.kind {
            updated.kind = kind;
        }
        if let Some(extra) = patch.metadata {
            for (key, value) in extra {
                updated.metadata.insert(key, value);
            }
        }
        if let Some(timestamp) = patch.timestamp {
            updated.timestamp = timestamp;
        }

        if updated.content != existing.content {
            if updated.content.trim().is_empty() {
                return Err(MemoryError::Validation("memory content must be non-empty".to_string()));
            }
            match self.embedder.generate_embedding(&updated.content).await {
                Ok(vector) => {
                    updated.embedding = Some(vector);
                    self.failures.resolve(id).await;
                }
                Err(err) => {
                    warn!(memory_id = %id, error = %err, "re-embedding failed; keeping document unembedded");
                    updated.embedding = None;
                    self.failures.record_failure(id, &updated.content, &err.to_string()).await;
                }
            }
        }

        self.docs.update_documents(&self.collection, &[updated.to_document()]).await?;
        Ok(updated)
    }

    /// Remove a memory and any failure record tracked for it.
    pub async fn delete_memory(&self, id: &str) -> MemoryResult<()> {
        self.docs.delete_documents(&self.collection, &[id.to_string()]).await?;
        self.failures.resolve(id).await;
        Ok(())
    }

    /// Best-effort batch delete with per-item isolation.
    pub async fn delete_memories(&self, ids: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome { total_processed: ids.len(), ..Default::default() };
        for id in ids {
            match self.delete_memory(id).await {
                Ok(()) => outcome.successful.push(id.clone()),
                Err(err) => outcome.failed.push(BatchFailure { id: id.clone(), error: err.to_string() }),
            }
        }
        outcome
    }

    /// Similarity search. An empty query returns no results without
    /// calling the embedding provider; otherwise distances are converted
    /// to `relevance = clamp(1 - d, 0, 1)` and filtered against the
    /// query's relevance floor. Ordering follows the store's ranking.
    pub async fn search_memories(&self, query: &SearchQuery) -> MemoryResult<Vec<ScoredMemory>> {
        let text = query.query.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.generate_embedding(text).await?;
        let limit = query.limit.unwrap_or(self.default_search_limit);
        let filter = query.kind.map(|tag| {
            let mut map = MetadataMap::new();
            map.insert("type".to_string(), json!(tag.as_str()));
            map
        });

        let hits = self
            .docs
            .query_collection(&self.collection, &[embedding], limit, filter.as_ref())
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut results = Vec::with_capacity(hits.ids.len());
        for index in 0..hits.ids.len() {
            let relevance = (1.0 - hits.distances[index]).clamp(0.0, 1.0);
            if query.min_relevance.is_some_and(|floor| relevance < floor) {
                continue;
            }

            let memory = Memory::from_parts(
                &hits.ids[index],
                &hits.documents[index],
                &hits.metadatas[index],
                &[],
            )?;
            if query.after.is_some_and(|after| memory.timestamp < after) {
                continue;
            }
            if query.before.is_some_and(|before| memory.timestamp > before) {
                continue;
            }

            let snippet = snippet::generate(&memory.content, text);
            results.push(ScoredMemory { memory, relevance, snippet });
        }

        debug!(query = text, hits = results.len(), "search complete");
        Ok(results)
    }

    /// Search using an existing memory's content as the query. The source
    /// memory itself is dropped from the results.
    pub async fn find_similar(&self, id: &str, limit: usize) -> MemoryResult<Vec<ScoredMemory>> {
        let memory = self
            .get_memory(id)
            .await?
            .ok_or_else(|| MemoryError::NotFound(format!("memory {id}")))?;

        let mut results = self
            .search_memories(&SearchQuery {
                query: memory.content,
                limit: Some(limit.saturating_add(1)),
                ..SearchQuery::default()
            })
            .await?;
        results.retain(|scored| scored.memory.id != id);
        results.truncate(limit);
        Ok(results)
    }

    /// Metadata-filtered listing of one kind.
    pub async fn memories_by_type(&self, tag: MemoryTag, limit: usize) -> MemoryResult<Vec<Memory>> {
        let mut filter = MetadataMap::new();
        filter.insert("type".to_string(), json!(tag.as_str()));
        let documents = self
            .docs
            .list_documents(&self.collection, Some(&filter), limit)
            .await?;
        documents
            .iter()
            .map(|doc| Memory::from_document(doc).map_err(MemoryError::from))
            .collect()
    }

    /// Most recent memories, optionally bounded by age. Recency is a
    /// client-side sort over a retrieved candidate pool, not
    /// index-accelerated; acceptable at moderate collection sizes.
    pub async fn recent_memories(
        &self,
        limit: usize,
        max_age: Option<Duration>,
    ) -> MemoryResult<Vec<Memory>> {
        let pool = limit.max(1).saturating_mul(RECENCY_SCAN_FACTOR).max(100);
        let documents = self.docs.list_documents(&self.collection, None, pool).await?;

        let cutoff = max_age.map(|age| Utc::now() - age);
        let mut memories = Vec::with_capacity(documents.len());
        for doc in &documents {
            let memory = Memory::from_document(doc)?;
            if cutoff.is_some_and(|cutoff| memory.timestamp < cutoff) {
                continue;
            }
            memories.push(memory);
        }
        memories.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        memories.truncate(limit);
        Ok(memories)
    }

    /// Retry every tracked failure below `max_retries`. A success writes
    /// the embedding back into the stored document and conditionally
    /// resolves the record; a failure bumps its retry count. Entries
    /// already at the cap are reported failed without an attempt.
    pub async fn reprocess_failed_embeddings(&self, max_retries: u32) -> ReprocessOutcome {
        let records = self.failures.snapshot().await;
        let mut outcome = ReprocessOutcome { total_processed: records.len(), ..Default::default() };

        for record in records {
            if record.retry_count >= max_retries {
                outcome.failed.push(BatchFailure {
                    id: record.memory_id,
                    error: format!("permanently failed after {} retries: {}", record.retry_count, record.error),
                });
                continue;
            }

            match self.embedder.generate_embedding(&record.content).await {
                Ok(vector) => match self.write_recovered_embedding(&record, vector).await {
                    Ok(true) => outcome.succeeded.push(record.memory_id),
                    Ok(false) => outcome.failed.push(BatchFailure {
                        id: record.memory_id,
                        error: "memory no longer exists".to_string(),
                    }),
                    Err(err) => outcome.failed.push(BatchFailure {
                        id: record.memory_id,
                        error: err.to_string(),
                    }),
                },
                Err(err) => {
                    self.failures
                        .record_failure(&record.memory_id, &record.content, &err.to_string())
                        .await;
                    outcome.failed.push(BatchFailure {
                        id: record.memory_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "reprocessed failed embeddings"
        );
        outcome
    }

    async fn write_recovered_embedding(
        &self,
        record: &FailedEmbedding,
        vector: Vec<f32>,
    ) -> MemoryResult<bool> {
        match self.get_memory(&record.memory_id).await? {
            Some(mut memory) => {
                memory.embedding = Some(vector);
                self.docs
                    .update_documents(&self.collection, &[memory.to_document()])
                    .await?;
                self.failures.resolve_if(&record.memory_id, record.retry_count).await;
                Ok(true)
            }
            None => {
                // Memory deleted since the failure was recorded; drop the
                // stale entry rather than resurrecting it.
                self.failures.resolve_if(&record.memory_id, record.retry_count).await;
                Ok(false)
            }
        }
    }

    /// Read-only view of the failure table.
    pub async fn failed_embeddings(&self) -> Vec<FailedEmbedding> {
        self.failures.snapshot().await
    }

    /// Total documents in the collection.
    pub async fn count(&self) -> MemoryResult<usize> {
        Ok(self.docs.count(&self.collection).await?)
    }
}
