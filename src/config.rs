//! Engine configuration with environment overrides.

use serde::{Deserialize, Serialize};
use std::env;

/// Settings for the remote embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings endpoint.
    pub base_url: String,
    /// Optional bearer token for the provider.
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model: String,
    /// Maximum number of texts per remote call; larger batches are split.
    pub max_batch_size: usize,
    /// Aggregate estimated-token ceiling for a single batch.
    pub max_batch_tokens: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: None,
            model: "nomic-embed-text".to_string(),
            max_batch_size: 64,
            max_batch_tokens: 8192,
        }
    }
}

/// Settings for the memory store and service layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Document-store collection holding all memories.
    pub collection: String,
    /// Maximum accepted conversation length, in characters.
    pub max_content_length: usize,
    /// Search result count when the caller does not specify one.
    pub default_search_limit: usize,
    /// Relevance floor for explicit searches.
    pub min_relevance: f32,
    /// Relevance floor when priming context from a current query.
    pub context_min_relevance: f32,
    /// Relevance floor for broad, recent-message-driven retrieval.
    pub broad_min_relevance: f32,
    /// Cap on memories selected into a context bundle.
    pub max_context_memories: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            collection: "memories".to_string(),
            max_content_length: 50_000,
            default_search_limit: 10,
            min_relevance: 0.7,
            context_min_relevance: 0.6,
            broad_min_relevance: 0.3,
            max_context_memories: 5,
        }
    }
}

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub memory: MemoryConfig,
    pub embedding: EmbeddingConfig,
}

impl EngineConfig {
    /// Build a config from defaults plus `RECALL_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("RECALL_EMBEDDING_URL") {
            config.embedding.base_url = url;
        }
        if let Ok(model) = env::var("RECALL_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(key) = env::var("RECALL_EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Some(batch) = env_usize("RECALL_EMBEDDING_BATCH_SIZE") {
            config.embedding.max_batch_size = batch.max(1);
        }
        if let Ok(collection) = env::var("RECALL_COLLECTION") {
            config.memory.collection = collection;
        }
        if let Some(max_len) = env_usize("RECALL_MAX_CONTENT_LENGTH") {
            config.memory.max_content_length = max_len;
        }

        config
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = EngineConfig::default();
        assert!(config.memory.min_relevance > config.memory.context_min_relevance);
        assert!(config.memory.context_min_relevance > config.memory.broad_min_relevance);
        assert!(config.embedding.max_batch_size > 0);
    }
}
