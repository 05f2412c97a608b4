//! Memory domain model
//!
//! A memory is a stored content unit with an optional vector embedding,
//! an open metadata map, and a kind-specific payload. Kinds are a closed
//! tagged sum; only conversations carry extra structure today.

pub mod document;
pub mod failures;
pub mod snippet;
pub mod store;

pub use failures::{FailureTracker, InMemoryFailureTracker};
pub use store::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::docstore::MetadataMap;

/// Kind of a memory, with any kind-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryKind {
    Conversation(ConversationDetail),
    Insight,
    Learning,
    Fact,
    ActionItem,
}

impl MemoryKind {
    pub fn tag(&self) -> MemoryTag {
        match self {
            MemoryKind::Conversation(_) => MemoryTag::Conversation,
            MemoryKind::Insight => MemoryTag::Insight,
            MemoryKind::Learning => MemoryTag::Learning,
            MemoryKind::Fact => MemoryTag::Fact,
            MemoryKind::ActionItem => MemoryTag::ActionItem,
        }
    }
}

/// Payload of a conversation memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationDetail {
    pub participants: Vec<String>,
    pub message_count: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Payload-free discriminant, used for filtering and result shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTag {
    Conversation,
    Insight,
    Learning,
    Fact,
    ActionItem,
}

impl MemoryTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTag::Conversation => "conversation",
            MemoryTag::Insight => "insight",
            MemoryTag::Learning => "learning",
            MemoryTag::Fact => "fact",
            MemoryTag::ActionItem => "action_item",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "conversation" => Some(MemoryTag::Conversation),
            "insight" => Some(MemoryTag::Insight),
            "learning" => Some(MemoryTag::Learning),
            "fact" => Some(MemoryTag::Fact),
            "action_item" => Some(MemoryTag::ActionItem),
            _ => None,
        }
    }
}

/// A single stored content unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub id: String,
    #[serde(flatten)]
    pub kind: MemoryKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: MetadataMap,
    /// Present once embedding succeeded; absent while tracked as failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Memory {
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: MetadataMap::new(),
            embedding: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Partial update applied by [`store::MemoryStore::update_memory`]. The
/// timestamp only moves when the patch explicitly carries one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPatch {
    pub content: Option<String>,
    pub kind: Option<MemoryKind>,
    pub metadata: Option<MetadataMap>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Similarity search parameters. An empty `query` short-circuits to no
/// results without touching the embedding provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub limit: Option<usize>,
    pub min_relevance: Option<f32>,
    pub kind: Option<MemoryTag>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

/// One search result with its normalized relevance and a query-aware snippet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub relevance: f32,
    pub snippet: String,
}

/// Per-item outcome accumulation for batch operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<BatchFailure>,
    pub total_processed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub id: String,
    pub error: String,
}

/// Outcome of one reprocessing sweep over tracked embedding failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReprocessOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<BatchFailure>,
    pub total_processed: usize,
}

/// Side-table record for a memory whose embedding has not succeeded yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEmbedding {
    pub memory_id: String,
    /// Snapshot of the content at failure time, retried verbatim.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub error: String,
    pub retry_count: u32,
}

impl FailedEmbedding {
    pub fn new(
        memory_id: impl Into<String>,
        content: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            memory_id: memory_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            error: error.into(),
            retry_count: 0,
        }
    }
}
