//! Document Store boundary
//!
//! Collection-scoped CRUD plus nearest-neighbor query against a
//! vector-indexed store. The engine only ever talks to this trait; the
//! vector index, sharding, and on-disk format live behind it.

pub mod local;
pub mod remote;

pub use local::LocalDocumentStore;
pub use remote::RemoteDocumentStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Open key-value metadata attached to a document.
pub type MetadataMap = serde_json::Map<String, serde_json::Value>;

/// The shape persisted per memory. An empty `embedding` vector encodes
/// "not yet embedded" and is skipped by similarity scans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: MetadataMap,
    pub document: String,
}

/// Nearest-neighbor results for one query embedding, as parallel vectors
/// ordered by distance ascending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryHits {
    pub ids: Vec<String>,
    pub distances: Vec<f32>,
    pub metadatas: Vec<MetadataMap>,
    pub documents: Vec<String>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Idempotently create a collection.
    async fn get_or_create_collection(&self, name: &str) -> Result<(), StoreError>;

    async fn add_documents(
        &self,
        collection: &str,
        documents: &[StoredDocument],
    ) -> Result<(), StoreError>;

    async fn update_documents(
        &self,
        collection: &str,
        documents: &[StoredDocument],
    ) -> Result<(), StoreError>;

    async fn delete_documents(&self, collection: &str, ids: &[String]) -> Result<(), StoreError>;

    /// Fetch by id; the result preserves the order of `ids`, with `None`
    /// for anything missing.
    async fn get_documents(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<Option<StoredDocument>>, StoreError>;

    /// k-NN over every embedded document, one [`QueryHits`] per query
    /// embedding. `filter` is an equality match over metadata fields.
    async fn query_collection(
        &self,
        collection: &str,
        embeddings: &[Vec<f32>],
        k: usize,
        filter: Option<&MetadataMap>,
    ) -> Result<Vec<QueryHits>, StoreError>;

    /// Metadata-filtered listing without a query vector, used by the
    /// by-type and recency retrievals.
    async fn list_documents(
        &self,
        collection: &str,
        filter: Option<&MetadataMap>,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    async fn count(&self, collection: &str) -> Result<usize, StoreError>;
}

/// Equality match of every filter entry against the document metadata.
pub(crate) fn matches_filter(metadata: &MetadataMap, filter: Option<&MetadataMap>) -> bool {
    match filter {
        None => true,
        Some(wanted) => wanted.iter().all(|(key, value)| metadata.get(key) == Some(value)),
    }
}
