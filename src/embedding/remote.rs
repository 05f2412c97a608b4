//! Remote embedding provider over an OpenAI-compatible HTTP endpoint.
//!
//! Each response row is tagged with the index of the input it belongs to;
//! rows are reassembled by index so provider-side reordering cannot
//! scramble results, and a missing index fails the whole call.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, MemoryError, MemoryResult};

pub struct RemoteEmbeddingProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_batch_size: usize,
    max_batch_tokens: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_batch_size: config.max_batch_size.max(1),
            max_batch_tokens: config.max_batch_tokens,
        }
    }

    /// One remote call for one already-sized batch.
    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest { model: &self.model, input: batch });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => EmbeddingError::Auth(body),
                429 => EmbeddingError::RateLimited(body),
                code => EmbeddingError::Malformed(format!("status {code}: {body}")),
            });
        }

        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
        reassemble(payload.data, batch.len())
    }
}

/// Order rows by their declared input index. Any missing index means the
/// provider silently dropped an input, which callers must not paper over.
fn reassemble(rows: Vec<EmbeddingRow>, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let received = rows.len();
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for row in rows {
        if row.index < expected {
            slots[row.index] = Some(row.embedding);
        }
    }

    let mut ordered = Vec::with_capacity(expected);
    for slot in slots {
        ordered.push(slot.ok_or(EmbeddingError::Incomplete { expected, received })?);
    }
    Ok(ordered)
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn generate_embeddings(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        let kept: Vec<String> = texts
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect();
        if kept.is_empty() {
            return Err(MemoryError::Validation(
                "no non-empty texts to embed".to_string(),
            ));
        }

        let mut vectors = Vec::with_capacity(kept.len());
        for chunk in kept.chunks(self.max_batch_size) {
            debug!(model = %self.model, batch = chunk.len(), "requesting embeddings");
            vectors.extend(self.embed_batch(chunk).await?);
        }
        Ok(vectors)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn max_batch_tokens(&self) -> usize {
        self.max_batch_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> RemoteEmbeddingProvider {
        RemoteEmbeddingProvider::new(&EmbeddingConfig {
            max_batch_size: 4,
            max_batch_tokens: 100,
            ..EmbeddingConfig::default()
        })
    }

    #[test]
    fn test_reassemble_restores_input_order() {
        let rows = vec![
            EmbeddingRow { index: 2, embedding: vec![3.0] },
            EmbeddingRow { index: 0, embedding: vec![1.0] },
            EmbeddingRow { index: 1, embedding: vec![2.0] },
        ];
        let ordered = reassemble(rows, 3).expect("complete response");
        assert_eq!(ordered, vec![vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[test]
    fn test_reassemble_rejects_missing_index() {
        let rows = vec![
            EmbeddingRow { index: 0, embedding: vec![1.0] },
            EmbeddingRow { index: 2, embedding: vec![3.0] },
        ];
        let err = reassemble(rows, 3).expect_err("index 1 missing");
        assert!(matches!(err, EmbeddingError::Incomplete { expected: 3, received: 2 }));
    }

    #[test]
    fn test_estimate_tokens_is_chars_over_four() {
        let p = provider();
        assert_eq!(p.estimate_tokens("abcdefgh"), 2);
        assert_eq!(p.estimate_tokens(""), 0);
    }

    #[test]
    fn test_can_process_batch_limits() {
        let p = provider();
        let small = vec!["hello".to_string(); 3];
        assert!(p.can_process_batch(&small));

        let too_many = vec!["hello".to_string(); 5];
        assert!(!p.can_process_batch(&too_many));

        // 4 items fits the count limit but blows the token budget.
        let too_long = vec!["x".repeat(200); 4];
        assert!(!p.can_process_batch(&too_long));
    }
}
