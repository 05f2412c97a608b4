//! Memory Service - business logic atop the memory store.
//!
//! Validates input, extracts insights and action items from captured
//! conversations, and curates token-budgeted context bundles. Every
//! operation either returns its success payload or a single uniformly
//! shaped [`ToolError`]; nothing else escapes this layer.

pub mod analyzer;

pub use analyzer::{PatternAnalyzer, TextAnalyzer};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::config::MemoryConfig;
use crate::docstore::MetadataMap;
use crate::embedding::APPROX_CHARS_PER_TOKEN;
use crate::error::{MemoryError, ToolError};
use crate::memory::{
    ConversationDetail, Memory, MemoryKind, MemoryStore, MemoryTag, ScoredMemory, SearchQuery,
};

const TOOL_CAPTURE: &str = "capture_conversation";
const TOOL_SEARCH: &str = "search_memory";
const TOOL_CONTEXT: &str = "get_context";

const MAX_INSIGHTS: usize = 5;
const MAX_ACTION_ITEMS: usize = 10;
/// How many trailing recent messages feed the broad context search.
const RECENT_MESSAGE_TAIL: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub content: String,
    pub participants: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub summary: Option<String>,
    pub metadata: Option<MetadataMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub success: bool,
    pub memory_id: String,
    pub message: String,
    pub extracted_insights: Vec<String>,
    pub action_items: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub min_relevance: Option<f32>,
    pub kind: Option<MemoryTag>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchHit>,
    pub total_count: usize,
    pub search_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub relevance_score: f32,
    pub timestamp: DateTime<Utc>,
    pub kind: MemoryTag,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextRequest {
    pub current_query: Option<String>,
    pub recent_messages: Option<Vec<String>>,
    pub max_memories: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub memories: Vec<ContextMemory>,
    pub token_estimate: usize,
    pub selection_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMemory {
    pub id: String,
    pub content: String,
    pub kind: MemoryTag,
    pub timestamp: DateTime<Utc>,
    /// Present for similarity-selected memories, absent for recency picks.
    pub relevance: Option<f32>,
}

pub struct MemoryService {
    store: MemoryStore,
    analyzer: Arc<dyn TextAnalyzer>,
    config: MemoryConfig,
}

impl MemoryService {
    pub fn new(store: MemoryStore, config: MemoryConfig) -> Self {
        Self { store, analyzer: Arc::new(PatternAnalyzer::new()), config }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn TextAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Validate, analyze, and persist a conversation. Validation happens
    /// before any store mutation; extraction is best-effort pattern
    /// matching, never a failure source.
    pub async fn capture_conversation(
        &self,
        request: CaptureRequest,
    ) -> Result<CaptureOutcome, ToolError> {
        let started = Instant::now();
        let args = args_of(&request);

        if request.content.trim().is_empty() {
            return Err(self.fail(
                TOOL_CAPTURE,
                args,
                started,
                MemoryError::Validation("content must be a non-empty string".to_string()),
            ));
        }
        let length = request.content.chars().count();
        if length > self.config.max_content_length {
            return Err(self.fail(
                TOOL_CAPTURE,
                args,
                started,
                MemoryError::Validation(format!(
                    "content length {length} exceeds maximum {}",
                    self.config.max_content_length
                )),
            ));
        }

        let participants = request
            .participants
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| vec!["user".to_string()]);
        let insights = self.analyzer.extract_insights(&request.content, MAX_INSIGHTS);
        let action_items = self.analyzer.extract_action_items(&request.content, MAX_ACTION_ITEMS);
        let message_count = self.analyzer.estimate_message_count(&request.content);

        let mut memory = Memory::new(
            MemoryKind::Conversation(ConversationDetail {
                participants,
                message_count,
                tags: request.tags.unwrap_or_default(),
                summary: request.summary,
            }),
            request.content,
        );
        if let Some(extra) = request.metadata {
            memory.metadata = extra;
        }

        let memory_id = match self.store.store_memory(memory).await {
            Ok(id) => id,
            Err(err) => return Err(self.fail(TOOL_CAPTURE, args, started, err)),
        };

        info!(
            %memory_id,
            insights = insights.len(),
            action_items = action_items.len(),
            "conversation captured"
        );
        Ok(CaptureOutcome {
            success: true,
            memory_id,
            message: format!(
                "Conversation stored with {} insight(s) and {} action item(s)",
                insights.len(),
                action_items.len()
            ),
            extracted_insights: insights,
            action_items,
        })
    }

    /// Similarity search with configured defaults and result shaping.
    pub async fn search_memory(&self, request: SearchRequest) -> Result<SearchOutcome, ToolError> {
        let started = Instant::now();
        let args = args_of(&request);

        let query = SearchQuery {
            query: request.query,
            limit: Some(request.limit.unwrap_or(self.config.default_search_limit)),
            min_relevance: Some(request.min_relevance.unwrap_or(self.config.min_relevance)),
            kind: request.kind,
            after: request.after,
            before: request.before,
        };

        let scored = match self.store.search_memories(&query).await {
            Ok(scored) => scored,
            Err(err) => return Err(self.fail(TOOL_SEARCH, args, started, err)),
        };

        let results: Vec<SearchHit> = scored
            .into_iter()
            .map(|s| SearchHit {
                id: s.memory.id,
                content: s.memory.content,
                relevance_score: s.relevance,
                timestamp: s.memory.timestamp,
                kind: s.memory.kind.tag(),
                snippet: s.snippet,
            })
            .collect();

        Ok(SearchOutcome {
            total_count: results.len(),
            results,
            search_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Curate a token-budgeted context bundle. Query-driven when a current
    /// query exists, broad search over recent messages otherwise, and
    /// recency-driven as the last resort. Always yields a human-readable
    /// selection reason, including for an empty selection.
    pub async fn get_context(&self, request: ContextRequest) -> Result<ContextBundle, ToolError> {
        let started = Instant::now();
        let max_memories = request.max_memories.unwrap_or(self.config.max_context_memories);

        let current_query = request
            .current_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());
        let recent_tail: Option<String> = request.recent_messages.as_ref().and_then(|messages| {
            let tail: Vec<&str> = messages
                .iter()
                .rev()
                .take(RECENT_MESSAGE_TAIL)
                .map(String::as_str)
                .collect();
            if tail.is_empty() { None } else { Some(tail.into_iter().rev().collect::<Vec<_>>().join("\n")) }
        });

        // Fetch one page beyond the cap so the reason can say whether the
        // cap actually cut anything.
        let fetch_limit = max_memories.saturating_mul(2);
        let (candidates, strategy): (Vec<(Memory, Option<f32>)>, &str) = if let Some(text) = current_query {
            let scored = self
                .search_scored(text, fetch_limit, self.config.context_min_relevance)
                .await
                .map_err(|err| self.fail(TOOL_CONTEXT, args_of(&request), started, err))?;
            (scored, "semantic similarity to the current query")
        } else if let Some(tail) = recent_tail {
            let scored = self
                .search_scored(&tail, fetch_limit, self.config.broad_min_relevance)
                .await
                .map_err(|err| self.fail(TOOL_CONTEXT, args_of(&request), started, err))?;
            (scored, "broad similarity to recent messages")
        } else {
            let recent = self
                .store
                .recent_memories(fetch_limit, None)
                .await
                .map_err(|err| self.fail(TOOL_CONTEXT, args_of(&request), started, err))?;
            (recent.into_iter().map(|m| (m, None)).collect(), "recency")
        };

        let capped = candidates.len() > max_memories;
        let mut token_estimate = 0;
        let memories: Vec<ContextMemory> = candidates
            .into_iter()
            .take(max_memories)
            .map(|(memory, relevance)| {
                token_estimate += estimate_memory_tokens(&memory);
                ContextMemory {
                    id: memory.id,
                    content: memory.content,
                    kind: memory.kind.tag(),
                    timestamp: memory.timestamp,
                    relevance,
                }
            })
            .collect();

        let selection_reason = if memories.is_empty() {
            "No relevant memories found for the current context.".to_string()
        } else {
            let mut reason = format!("Selected {} memories by {strategy}", memories.len());
            if capped {
                reason.push_str(&format!(", capped at {max_memories}"));
            }
            reason.push('.');
            reason
        };

        Ok(ContextBundle { memories, token_estimate, selection_reason })
    }

    async fn search_scored(
        &self,
        text: &str,
        limit: usize,
        floor: f32,
    ) -> Result<Vec<(Memory, Option<f32>)>, MemoryError> {
        let scored = self
            .store
            .search_memories(&SearchQuery {
                query: text.to_string(),
                limit: Some(limit),
                min_relevance: Some(floor),
                ..SearchQuery::default()
            })
            .await?;
        Ok(scored
            .into_iter()
            .map(|ScoredMemory { memory, relevance, .. }| (memory, Some(relevance)))
            .collect())
    }

    fn fail(&self, tool: &str, args: Value, started: Instant, err: MemoryError) -> ToolError {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        error!(tool, error = %err, elapsed_ms, "tool execution failed");
        ToolError {
            tool: tool.to_string(),
            message: err.to_string(),
            args,
            elapsed_ms,
            source: Some(err),
        }
    }
}

/// Token cost of injecting one memory: content plus serialized metadata,
/// at the same chars-per-token approximation the provider uses.
fn estimate_memory_tokens(memory: &Memory) -> usize {
    let metadata_len = serde_json::to_string(&memory.metadata)
        .map(|s| s.len())
        .unwrap_or(0);
    (memory.content.len() + metadata_len) / APPROX_CHARS_PER_TOKEN
}

fn args_of<T: Serialize>(request: &T) -> Value {
    serde_json::to_value(request).unwrap_or(Value::Null)
}
