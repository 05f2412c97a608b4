//! Embedding Provider boundary
//!
//! Converts text into fixed-dimension vectors. The trait keeps batch
//! admission and token estimation local so callers can size requests
//! without a network round trip.

pub mod remote;

pub use remote::RemoteEmbeddingProvider;

use async_trait::async_trait;

use crate::error::{EmbeddingError, MemoryError, MemoryResult};

/// Rough chars-per-token ratio used by [`EmbeddingProvider::estimate_tokens`].
pub const APPROX_CHARS_PER_TOKEN: usize = 4;

/// A text-to-vector provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, preserving input order. Empty entries are
    /// filtered out; fails with a validation error when *all* inputs are
    /// empty. Batches above [`Self::max_batch_size`] are split into
    /// sequential sub-batches and concatenated in order.
    async fn generate_embeddings(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>>;

    /// Embed a single text. Fails with a validation error on empty or
    /// whitespace input, and with a provider error when no vector comes back.
    async fn generate_embedding(&self, text: &str) -> MemoryResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(MemoryError::Validation(
                "cannot embed empty or whitespace-only text".to_string(),
            ));
        }
        let mut vectors = self.generate_embeddings(&[text.to_string()]).await?;
        vectors
            .pop()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EmbeddingError::Incomplete { expected: 1, received: 0 }.into())
    }

    /// Maximum texts accepted in one remote call.
    fn max_batch_size(&self) -> usize;

    /// Aggregate estimated-token ceiling for one remote call.
    fn max_batch_tokens(&self) -> usize;

    /// Token estimate at ~4 characters per token. An approximation only;
    /// real tokenizers will disagree.
    fn estimate_tokens(&self, text: &str) -> usize {
        text.chars().count() / APPROX_CHARS_PER_TOKEN
    }

    /// Whether a batch fits both the item-count and token limits.
    fn can_process_batch(&self, texts: &[String]) -> bool {
        texts.len() <= self.max_batch_size()
            && texts.iter().map(|t| self.estimate_tokens(t)).sum::<usize>()
                <= self.max_batch_tokens()
    }
}
