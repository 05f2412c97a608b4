//! Shared test doubles: a deterministic embedding provider with a failure
//! switch and a document store that fails writes for marked ids.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use recall::docstore::{
    DocumentStore, LocalDocumentStore, MetadataMap, QueryHits, StoredDocument,
};
use recall::embedding::EmbeddingProvider;
use recall::error::{EmbeddingError, MemoryError, MemoryResult, StoreError};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Deterministic provider. "alpha"/"beta"/"gamma" map to fixed unit vectors
/// with cos(alpha, beta) = 0.8 and cos(alpha, gamma) = 0.6, so distance and
/// relevance assertions have known values; everything else hashes words
/// into four buckets.
#[derive(Default)]
pub struct StubProvider {
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn vector_for(text: &str) -> Vec<f32> {
    let lowered = text.to_lowercase();
    if lowered.contains("alpha") {
        return vec![1.0, 0.0, 0.0, 0.0];
    }
    if lowered.contains("beta") {
        return vec![0.8, 0.6, 0.0, 0.0];
    }
    if lowered.contains("gamma") {
        return vec![0.6, 0.8, 0.0, 0.0];
    }

    let mut buckets = [0.0f32; 4];
    for word in lowered.split_whitespace() {
        let mut hash: usize = 0;
        for byte in word.bytes() {
            hash = hash.wrapping_mul(31).wrapping_add(byte as usize);
        }
        buckets[hash % 4] += 1.0;
    }
    let norm = buckets.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut buckets {
            *x /= norm;
        }
    }
    buckets.to_vec()
}

#[async_trait]
impl EmbeddingProvider for StubProvider {
    async fn generate_embeddings(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(MemoryError::Provider(EmbeddingError::RateLimited(
                "stub provider offline".to_string(),
            )));
        }
        Ok(texts.iter().map(|t| vector_for(t)).collect())
    }

    fn max_batch_size(&self) -> usize {
        16
    }

    fn max_batch_tokens(&self) -> usize {
        8192
    }
}

/// Delegates to a [`LocalDocumentStore`], but any write containing an id
/// prefixed "poison" fails, for exercising per-item batch isolation.
#[derive(Default)]
pub struct FlakyDocumentStore {
    inner: LocalDocumentStore,
}

impl FlakyDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for FlakyDocumentStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<(), StoreError> {
        self.inner.get_or_create_collection(name).await
    }

    async fn add_documents(
        &self,
        collection: &str,
        documents: &[StoredDocument],
    ) -> Result<(), StoreError> {
        if documents.iter().any(|doc| doc.id.starts_with("poison")) {
            return Err(StoreError::Backend {
                status: 500,
                message: "simulated write failure".to_string(),
            });
        }
        self.inner.add_documents(collection, documents).await
    }

    async fn update_documents(
        &self,
        collection: &str,
        documents: &[StoredDocument],
    ) -> Result<(), StoreError> {
        self.inner.update_documents(collection, documents).await
    }

    async fn delete_documents(&self, collection: &str, ids: &[String]) -> Result<(), StoreError> {
        self.inner.delete_documents(collection, ids).await
    }

    async fn get_documents(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<Option<StoredDocument>>, StoreError> {
        self.inner.get_documents(collection, ids).await
    }

    async fn query_collection(
        &self,
        collection: &str,
        embeddings: &[Vec<f32>],
        k: usize,
        filter: Option<&MetadataMap>,
    ) -> Result<Vec<QueryHits>, StoreError> {
        self.inner.query_collection(collection, embeddings, k, filter).await
    }

    async fn list_documents(
        &self,
        collection: &str,
        filter: Option<&MetadataMap>,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.inner.list_documents(collection, filter, limit).await
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        self.inner.count(collection).await
    }
}
