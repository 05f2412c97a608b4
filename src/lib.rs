//! Recall - Semantic Memory Engine
//!
//! Durably persists text as vector-embedded memories and retrieves them
//! by similarity, with:
//! - Failure-tolerant writes (embedding failure never loses data)
//! - Retry bookkeeping for unembedded documents
//! - Relevance-scored similarity search with query-aware snippets
//! - Token-budgeted context curation with selection reasoning

pub mod config;
pub mod docstore;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod service;

// Re-exports for convenience
pub use config::EngineConfig;
pub use docstore::{DocumentStore, LocalDocumentStore, RemoteDocumentStore};
pub use embedding::{EmbeddingProvider, RemoteEmbeddingProvider};
pub use error::{EmbeddingError, MemoryError, MemoryResult, StoreError, ToolError};
pub use memory::{Memory, MemoryKind, MemoryStore, MemoryTag};
pub use service::MemoryService;
