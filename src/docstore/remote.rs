//! HTTP client for a remote vector-store server.
//!
//! Thin JSON-over-POST client; the server owns the index and the on-disk
//! format. Route shapes mirror the trait one-to-one.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::{DocumentStore, MetadataMap, QueryHits, StoredDocument};
use crate::error::StoreError;

pub struct RemoteDocumentStore {
    client: Client,
    base_url: String,
}

#[derive(serde::Deserialize)]
struct GetResponse {
    documents: Vec<Option<StoredDocument>>,
}

#[derive(serde::Deserialize)]
struct QueryResponse {
    results: Vec<QueryHits>,
}

#[derive(serde::Deserialize)]
struct ListResponse {
    documents: Vec<StoredDocument>,
}

#[derive(serde::Deserialize)]
struct CountResponse {
    count: usize,
}

impl RemoteDocumentStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client: Client::new(), base_url }
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, StoreError> {
        debug!(path, "document store request");
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend { status: status.as_u16(), message });
        }
        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for RemoteDocumentStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<(), StoreError> {
        let _: serde_json::Value = self.post("/collections", &json!({ "name": name })).await?;
        Ok(())
    }

    async fn add_documents(
        &self,
        collection: &str,
        documents: &[StoredDocument],
    ) -> Result<(), StoreError> {
        let _: serde_json::Value = self
            .post(
                &format!("/collections/{collection}/add"),
                &json!({ "documents": documents }),
            )
            .await?;
        Ok(())
    }

    async fn update_documents(
        &self,
        collection: &str,
        documents: &[StoredDocument],
    ) -> Result<(), StoreError> {
        let _: serde_json::Value = self
            .post(
                &format!("/collections/{collection}/update"),
                &json!({ "documents": documents }),
            )
            .await?;
        Ok(())
    }

    async fn delete_documents(&self, collection: &str, ids: &[String]) -> Result<(), StoreError> {
        let _: serde_json::Value = self
            .post(&format!("/collections/{collection}/delete"), &json!({ "ids": ids }))
            .await?;
        Ok(())
    }

    async fn get_documents(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<Option<StoredDocument>>, StoreError> {
        let response: GetResponse = self
            .post(&format!("/collections/{collection}/get"), &json!({ "ids": ids }))
            .await?;
        if response.documents.len() != ids.len() {
            return Err(StoreError::Decode(format!(
                "requested {} documents, server answered with {}",
                ids.len(),
                response.documents.len()
            )));
        }
        Ok(response.documents)
    }

    async fn query_collection(
        &self,
        collection: &str,
        embeddings: &[Vec<f32>],
        k: usize,
        filter: Option<&MetadataMap>,
    ) -> Result<Vec<QueryHits>, StoreError> {
        let response: QueryResponse = self
            .post(
                &format!("/collections/{collection}/query"),
                &json!({ "embeddings": embeddings, "k": k, "filter": filter }),
            )
            .await?;
        Ok(response.results)
    }

    async fn list_documents(
        &self,
        collection: &str,
        filter: Option<&MetadataMap>,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let response: ListResponse = self
            .post(
                &format!("/collections/{collection}/list"),
                &json!({ "filter": filter, "limit": limit }),
            )
            .await?;
        Ok(response.documents)
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let response: CountResponse = self
            .post(&format!("/collections/{collection}/count"), &json!({}))
            .await?;
        Ok(response.count)
    }
}
