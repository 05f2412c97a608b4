//! Memory <-> document conversion.
//!
//! The document store only understands flat metadata, so the kind payload
//! is flattened into reserved keys on the way in and rebuilt on the way
//! out. List-valued fields travel as comma-joined strings.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{ConversationDetail, Memory, MemoryKind};
use crate::docstore::{MetadataMap, StoredDocument};
use crate::error::StoreError;

const KEY_TYPE: &str = "type";
const KEY_TIMESTAMP: &str = "timestamp";
const KEY_PARTICIPANTS: &str = "participants";
const KEY_MESSAGE_COUNT: &str = "message_count";
const KEY_TAGS: &str = "tags";
const KEY_SUMMARY: &str = "summary";

impl Memory {
    /// Flatten into the persisted document shape. A memory without an
    /// embedding is written with an empty vector so the write itself never
    /// depends on the embedding step.
    pub fn to_document(&self) -> StoredDocument {
        let mut metadata = self.metadata.clone();
        metadata.insert(KEY_TYPE.to_string(), json!(self.kind.tag().as_str()));
        metadata.insert(KEY_TIMESTAMP.to_string(), json!(self.timestamp.to_rfc3339()));

        if let MemoryKind::Conversation(detail) = &self.kind {
            metadata.insert(KEY_PARTICIPANTS.to_string(), json!(detail.participants.join(",")));
            metadata.insert(KEY_MESSAGE_COUNT.to_string(), json!(detail.message_count));
            metadata.insert(KEY_TAGS.to_string(), json!(detail.tags.join(",")));
            if let Some(summary) = &detail.summary {
                metadata.insert(KEY_SUMMARY.to_string(), json!(summary));
            }
        }

        StoredDocument {
            id: self.id.clone(),
            embedding: self.embedding.clone().unwrap_or_default(),
            metadata,
            document: self.content.clone(),
        }
    }

    /// Rebuild a memory from its persisted document.
    pub fn from_document(doc: &StoredDocument) -> Result<Self, StoreError> {
        Self::from_parts(&doc.id, &doc.document, &doc.metadata, &doc.embedding)
    }

    /// Rebuild from the pieces a query result hands back, where the
    /// embedding is typically not returned.
    pub fn from_parts(
        id: &str,
        content: &str,
        metadata: &MetadataMap,
        embedding: &[f32],
    ) -> Result<Self, StoreError> {
        let tag = metadata
            .get(KEY_TYPE)
            .and_then(|v| v.as_str())
            .ok_or_else(|| StoreError::Decode(format!("document {id} has no type field")))?;

        let timestamp = metadata
            .get(KEY_TIMESTAMP)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| StoreError::Decode(format!("document {id} has no valid timestamp")))?;

        let kind = match tag {
            "conversation" => MemoryKind::Conversation(ConversationDetail {
                participants: split_joined(metadata.get(KEY_PARTICIPANTS)),
                message_count: metadata
                    .get(KEY_MESSAGE_COUNT)
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                tags: split_joined(metadata.get(KEY_TAGS)),
                summary: metadata
                    .get(KEY_SUMMARY)
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            }),
            "insight" => MemoryKind::Insight,
            "learning" => MemoryKind::Learning,
            "fact" => MemoryKind::Fact,
            "action_item" => MemoryKind::ActionItem,
            other => {
                return Err(StoreError::Decode(format!(
                    "document {id} has unknown memory type '{other}'"
                )))
            }
        };

        let reserved: &[&str] = match kind {
            MemoryKind::Conversation(_) => &[
                KEY_TYPE,
                KEY_TIMESTAMP,
                KEY_PARTICIPANTS,
                KEY_MESSAGE_COUNT,
                KEY_TAGS,
                KEY_SUMMARY,
            ],
            _ => &[KEY_TYPE, KEY_TIMESTAMP],
        };
        let open: MetadataMap = metadata
            .iter()
            .filter(|(key, _)| !reserved.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Memory {
            id: id.to_string(),
            kind,
            content: content.to_string(),
            timestamp,
            metadata: open,
            embedding: if embedding.is_empty() { None } else { Some(embedding.to_vec()) },
        })
    }
}

fn split_joined(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_str())
        .map(|s| {
            s.split(',')
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
