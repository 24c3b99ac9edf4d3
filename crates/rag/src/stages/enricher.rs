//! Joins retrieved chunks with their authoritative source records.

use std::sync::Arc;

use recall_core::AppResult;
use serde_json::{Map, Value};

use super::Stage;
use crate::metadata_store::MetadataStore;
use crate::state::{PipelineState, StateDelta};
use crate::types::{EnrichedChunk, RetrievedChunk, SourceRecord, SourceType};

const EXCERPT_CHARS: usize = 200;

/// Resolves each chunk's `source_id` against the matching store.
///
/// Best effort: a chunk whose source cannot be resolved is dropped and the
/// rest carry on. Input order is kept.
pub struct MetadataEnricher {
    store: Arc<dyn MetadataStore>,
}

impl MetadataEnricher {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    pub async fn enrich(&self, chunks: &[RetrievedChunk]) -> Vec<EnrichedChunk> {
        let mut enriched = Vec::with_capacity(chunks.len());

        for (position, chunk) in chunks.iter().enumerate() {
            match self.enrich_one(chunk).await {
                Some(item) => enriched.push(item),
                None => tracing::debug!(position, "Chunk dropped during enrichment"),
            }
        }

        enriched
    }

    async fn enrich_one(&self, chunk: &RetrievedChunk) -> Option<EnrichedChunk> {
        let meta = &chunk.embedding_metadata;

        let Some(source_id) = meta.get("source_id").and_then(scalar_string) else {
            tracing::warn!("Chunk has no source_id, skipping");
            return None;
        };

        let raw_type = meta.get("source_type").and_then(Value::as_str);
        let Some(source_type) = raw_type.and_then(SourceType::parse) else {
            tracing::warn!(source_id = %source_id, source_type = ?raw_type, "Unknown source type, skipping");
            return None;
        };

        let source = match source_type {
            SourceType::Document => match self.store.get_document_metadata(&source_id).await {
                Ok(Some(metadata)) => SourceRecord::Document {
                    metadata,
                    page_number: meta.get("page_number").and_then(as_u32),
                },
                Ok(None) => {
                    tracing::warn!(source_id = %source_id, "Document not found, skipping chunk");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(source_id = %source_id, error = %e, "Document lookup failed, skipping chunk");
                    return None;
                }
            },
            SourceType::Meeting => match self.store.get_meeting_metadata(&source_id).await {
                Ok(Some(metadata)) => SourceRecord::Meeting {
                    metadata,
                    timestamp: meta.get("timestamp").and_then(scalar_string),
                },
                Ok(None) => {
                    tracing::warn!(source_id = %source_id, "Meeting not found, skipping chunk");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(source_id = %source_id, error = %e, "Meeting lookup failed, skipping chunk");
                    return None;
                }
            },
        };

        Some(EnrichedChunk {
            content: chunk.content.clone(),
            excerpt: derive_excerpt(&chunk.content),
            similarity_score: chunk.similarity_score,
            source_id,
            chunk_index: chunk_index(meta),
            source,
        })
    }
}

#[async_trait::async_trait]
impl Stage for MetadataEnricher {
    fn name(&self) -> &'static str {
        "metadata_enricher"
    }

    async fn run(&self, state: &PipelineState) -> AppResult<StateDelta> {
        let chunks = state.retrieved_chunks.as_deref().unwrap_or_default();

        let enriched = if chunks.is_empty() {
            Vec::new()
        } else {
            self.enrich(chunks).await
        };

        tracing::info!(
            retrieved = chunks.len(),
            enriched = enriched.len(),
            "Metadata enrichment complete"
        );

        Ok(StateDelta {
            enriched_chunks: Some(enriched),
            ..Default::default()
        })
    }
}

/// First 200 characters of `content`, with `...` only when something was cut.
pub fn derive_excerpt(content: &str) -> String {
    match content.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Ids and timestamps may be stored as strings or numbers.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn chunk_index(meta: &Map<String, Value>) -> Option<u32> {
    meta.get("chunk_index").and_then(as_u32)
}
