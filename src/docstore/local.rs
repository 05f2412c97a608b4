//! In-process document store with a brute-force cosine scan.
//!
//! Distance metric is fixed: `d = 1 - cos(a, b)`, so the engine's
//! `1 - d` relevance stays inside [0, 1] for non-negative similarity.
//! Suitable for tests and small single-process deployments; anything
//! index-accelerated belongs behind the remote store.

use async_trait::async_trait;
use rayon::prelude::*;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{matches_filter, DocumentStore, MetadataMap, QueryHits, StoredDocument};
use crate::error::StoreError;

#[derive(Default)]
pub struct LocalDocumentStore {
    collections: RwLock<HashMap<String, Vec<StoredDocument>>>,
}

impl LocalDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 1.0;
        }
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        1.0 - dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn add_documents(
        &self,
        collection: &str,
        documents: &[StoredDocument],
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let entries = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        for doc in documents {
            entries.retain(|existing| existing.id != doc.id);
            entries.push(doc.clone());
        }
        Ok(())
    }

    async fn update_documents(
        &self,
        collection: &str,
        documents: &[StoredDocument],
    ) -> Result<(), StoreError> {
        // Same upsert semantics as add: last write per id wins.
        self.add_documents(collection, documents).await
    }

    async fn delete_documents(&self, collection: &str, ids: &[String]) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let entries = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        entries.retain(|doc| !ids.contains(&doc.id));
        Ok(())
    }

    async fn get_documents(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<Option<StoredDocument>>, StoreError> {
        let collections = self.collections.read().await;
        let entries = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(ids
            .iter()
            .map(|id| entries.iter().find(|doc| &doc.id == id).cloned())
            .collect())
    }

    async fn query_collection(
        &self,
        collection: &str,
        embeddings: &[Vec<f32>],
        k: usize,
        filter: Option<&MetadataMap>,
    ) -> Result<Vec<QueryHits>, StoreError> {
        let collections = self.collections.read().await;
        let entries = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        let mut all_hits = Vec::with_capacity(embeddings.len());
        for query in embeddings {
            let mut scored: Vec<(f32, &StoredDocument)> = entries
                .par_iter()
                .filter(|doc| !doc.embedding.is_empty())
                .filter(|doc| matches_filter(&doc.metadata, filter))
                .map(|doc| (Self::cosine_distance(query, &doc.embedding), doc))
                .collect();
            scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(k);

            debug!(collection, hits = scored.len(), "similarity scan complete");

            let mut hits = QueryHits::default();
            for (distance, doc) in scored {
                hits.ids.push(doc.id.clone());
                hits.distances.push(distance);
                hits.metadatas.push(doc.metadata.clone());
                hits.documents.push(doc.document.clone());
            }
            all_hits.push(hits);
        }
        Ok(all_hits)
    }

    async fn list_documents(
        &self,
        collection: &str,
        filter: Option<&MetadataMap>,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let collections = self.collections.read().await;
        let entries = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(entries
            .iter()
            .filter(|doc| matches_filter(&doc.metadata, filter))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let collections = self.collections.read().await;
        let entries = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(entries.len())
    }
}
