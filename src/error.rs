//! Typed error surface for the memory engine.
//!
//! Embedding failures carry their provider-side category so callers can
//! distinguish a rate limit from a bad credential; everything else funnels
//! into [`MemoryError`]. The service layer wraps all of it into a single
//! [`ToolError`] shape at its boundary.

use thiserror::Error;

/// Failure categories reported by the embedding provider boundary.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider rejected credentials: {0}")]
    Auth(String),

    #[error("embedding provider rate limit hit: {0}")]
    RateLimited(String),

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    /// The provider answered, but at least one requested index was absent.
    #[error("incomplete embedding response: expected {expected} vectors, received {received}")]
    Incomplete { expected: usize, received: usize },

    #[error("network failure reaching embedding provider: {0}")]
    Network(#[from] reqwest::Error),
}

/// Failures at the document store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("document store rejected request (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("could not decode document store payload: {0}")]
    Decode(String),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),
}

/// Top-level error type for store and provider operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Bad, oversized, or missing input. Raised before any mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Provider(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type MemoryResult<T> = Result<T, MemoryError>;

/// Uniform wrapper returned by every [`crate::service::MemoryService`]
/// operation that fails: carries the tool name, the original arguments, and
/// the elapsed time so the caller-facing boundary can format one shape.
#[derive(Debug, Error)]
#[error("tool '{tool}' failed after {elapsed_ms}ms: {message}")]
pub struct ToolError {
    pub tool: String,
    pub message: String,
    pub args: serde_json::Value,
    pub elapsed_ms: u64,
    #[source]
    pub source: Option<MemoryError>,
}
