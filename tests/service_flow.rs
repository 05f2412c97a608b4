//! Memory Service flow: validation, extraction, search shaping, and
//! context curation.

mod common;

use std::sync::Arc;

use common::StubProvider;
use recall::config::MemoryConfig;
use recall::docstore::{DocumentStore, LocalDocumentStore};
use recall::memory::{Memory, MemoryKind, MemoryStore};
use recall::service::{CaptureRequest, ContextRequest, MemoryService, SearchRequest};

async fn setup(config: MemoryConfig) -> (Arc<StubProvider>, MemoryStore, MemoryService) {
    common::init_tracing();
    let provider = Arc::new(StubProvider::new());
    let docs: Arc<dyn DocumentStore> = Arc::new(LocalDocumentStore::new());
    let store = MemoryStore::new(docs, provider.clone(), &config)
        .await
        .expect("setup");
    let service = MemoryService::new(store.clone(), config);
    (provider, store, service)
}

#[tokio::test]
async fn test_capture_extracts_insights_and_action_items() {
    let (_provider, store, service) = setup(MemoryConfig::default()).await;

    let outcome = service
        .capture_conversation(CaptureRequest {
            content: "I learned that retries should be idempotent. TODO: write a test."
                .to_string(),
            ..CaptureRequest::default()
        })
        .await
        .expect("capture");

    assert!(outcome.success);
    assert!(outcome
        .extracted_insights
        .iter()
        .any(|i| i.contains("retries should be idempotent")));
    assert!(outcome.action_items.iter().any(|a| a.contains("write a test")));

    let stored = store
        .get_memory(&outcome.memory_id)
        .await
        .expect("get")
        .expect("persisted");
    match stored.kind {
        MemoryKind::Conversation(detail) => {
            assert_eq!(detail.participants, vec!["user".to_string()]);
            assert!(detail.message_count >= 1);
        }
        other => panic!("expected a conversation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_capture_handles_long_accented_extractions() {
    let (_provider, store, service) = setup(MemoryConfig::default()).await;

    // An extracted item well past the capture cap, made of multi-byte
    // chars so truncation must respect char boundaries.
    let content = format!("user: I learned that caf{} is busy", "é".repeat(120));
    let outcome = service
        .capture_conversation(CaptureRequest { content, ..CaptureRequest::default() })
        .await
        .expect("capture");

    assert!(outcome.success);
    assert!(outcome.extracted_insights.iter().any(|i| i.ends_with("...")));
    assert_eq!(store.count().await.expect("count"), 1);
}

#[tokio::test]
async fn test_capture_oversized_content_writes_nothing() {
    let config = MemoryConfig { max_content_length: 100, ..MemoryConfig::default() };
    let (provider, store, service) = setup(config).await;

    let err = service
        .capture_conversation(CaptureRequest {
            content: "x".repeat(101),
            ..CaptureRequest::default()
        })
        .await
        .expect_err("oversized content");

    assert_eq!(err.tool, "capture_conversation");
    assert!(err.message.contains("validation"));
    // Validation precedes any mutation: neither collaborator was touched.
    assert_eq!(store.count().await.expect("count"), 0);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_capture_empty_content_rejected() {
    let (_provider, store, service) = setup(MemoryConfig::default()).await;

    let err = service
        .capture_conversation(CaptureRequest { content: "   ".to_string(), ..CaptureRequest::default() })
        .await
        .expect_err("empty content");
    assert!(err.message.contains("non-empty"));
    assert_eq!(store.count().await.expect("count"), 0);
}

#[tokio::test]
async fn test_search_applies_default_relevance_floor() {
    let (_provider, store, service) = setup(MemoryConfig::default()).await;
    store
        .store_memory(Memory::new(MemoryKind::Fact, "beta subject"))
        .await
        .expect("store");
    store
        .store_memory(Memory::new(MemoryKind::Fact, "gamma subject"))
        .await
        .expect("store");

    // Relevances against "alpha" are 0.8 and 0.6; the default floor of
    // 0.7 keeps only the first.
    let outcome = service
        .search_memory(SearchRequest { query: "alpha".to_string(), ..SearchRequest::default() })
        .await
        .expect("search");

    assert_eq!(outcome.total_count, 1);
    let hit = &outcome.results[0];
    assert!(hit.content.contains("beta"));
    assert!((hit.relevance_score - 0.8).abs() < 1e-3);
    assert!(!hit.snippet.is_empty());
}

#[tokio::test]
async fn test_context_on_empty_store_still_explains_itself() {
    let (_provider, _store, service) = setup(MemoryConfig::default()).await;

    let bundle = service
        .get_context(ContextRequest::default())
        .await
        .expect("context");

    assert!(bundle.memories.is_empty());
    assert_eq!(bundle.token_estimate, 0);
    assert!(bundle.selection_reason.contains("No relevant memories found"));
}

#[tokio::test]
async fn test_context_is_query_driven_when_query_present() {
    let (_provider, store, service) = setup(MemoryConfig::default()).await;
    store
        .store_memory(Memory::new(MemoryKind::Fact, "beta topic notes"))
        .await
        .expect("store");
    store
        .store_memory(Memory::new(MemoryKind::Fact, "gamma topic notes"))
        .await
        .expect("store");

    let bundle = service
        .get_context(ContextRequest {
            current_query: Some("beta".to_string()),
            ..ContextRequest::default()
        })
        .await
        .expect("context");

    assert!(!bundle.memories.is_empty());
    assert!(bundle.memories.iter().all(|m| m.relevance.is_some()));
    assert!(bundle.selection_reason.contains("current query"));
    assert!(bundle.token_estimate > 0);
}

#[tokio::test]
async fn test_context_falls_back_to_recency() {
    let (_provider, store, service) = setup(MemoryConfig::default()).await;
    for index in 0..3 {
        store
            .store_memory(Memory::new(MemoryKind::Fact, format!("note number {index}")))
            .await
            .expect("store");
    }

    let bundle = service
        .get_context(ContextRequest::default())
        .await
        .expect("context");

    assert_eq!(bundle.memories.len(), 3);
    assert!(bundle.memories.iter().all(|m| m.relevance.is_none()));
    assert!(bundle.selection_reason.contains("recency"));
}

#[tokio::test]
async fn test_context_respects_memory_cap() {
    let (_provider, store, service) = setup(MemoryConfig::default()).await;
    for index in 0..12 {
        store
            .store_memory(Memory::new(MemoryKind::Fact, format!("filler {index}")))
            .await
            .expect("store");
    }

    let bundle = service
        .get_context(ContextRequest { max_memories: Some(3), ..ContextRequest::default() })
        .await
        .expect("context");

    assert_eq!(bundle.memories.len(), 3);
    assert!(bundle.selection_reason.contains("capped at 3"));
}

#[tokio::test]
async fn test_context_tolerates_huge_memory_cap() {
    let (_provider, store, service) = setup(MemoryConfig::default()).await;
    store
        .store_memory(Memory::new(MemoryKind::Fact, "lone note"))
        .await
        .expect("store");

    // The internal fetch limit derives from the cap; an extreme cap must
    // saturate instead of overflowing.
    let bundle = service
        .get_context(ContextRequest { max_memories: Some(usize::MAX), ..ContextRequest::default() })
        .await
        .expect("context");

    assert_eq!(bundle.memories.len(), 1);
}

#[tokio::test]
async fn test_context_uses_recent_messages_for_broad_search() {
    let (_provider, store, service) = setup(MemoryConfig::default()).await;
    store
        .store_memory(Memory::new(MemoryKind::Fact, "beta background"))
        .await
        .expect("store");

    let bundle = service
        .get_context(ContextRequest {
            recent_messages: Some(vec![
                "unrelated early message".to_string(),
                "tell me about beta".to_string(),
            ]),
            ..ContextRequest::default()
        })
        .await
        .expect("context");

    assert!(!bundle.memories.is_empty());
    assert!(bundle.selection_reason.contains("recent messages"));
}
