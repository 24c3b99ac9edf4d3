//! Vector search over the corpus.

use std::sync::Arc;

use recall_core::{AppError, AppResult};

use super::Stage;
use crate::state::{PipelineState, StateDelta};
use crate::types::RetrievedChunk;
use crate::vector_index::VectorIndex;

pub const NO_RESULTS_NOTE: &str = "No relevant information found in the knowledge base.";

/// Searches the index with the raw question text.
///
/// The query analysis is only logged; it does not shape the search.
pub struct RetrievalAgent {
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl RetrievalAgent {
    pub fn new(index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self { index, top_k }
    }
}

#[async_trait::async_trait]
impl Stage for RetrievalAgent {
    fn name(&self) -> &'static str {
        "retrieval"
    }

    async fn run(&self, state: &PipelineState) -> AppResult<StateDelta> {
        if let Some(analysis) = &state.query_analysis {
            tracing::debug!(
                query_type = analysis.query_type.as_str(),
                keywords = ?analysis.keywords,
                "Retrieving with analyzed query"
            );
        }

        let hits = self
            .index
            .search(state.query(), self.top_k)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Vector search failed");
                match e {
                    AppError::Retrieval(_) => e,
                    other => AppError::Retrieval(format!("Vector search failed: {}", other)),
                }
            })?;

        let chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                content: hit.content,
                embedding_metadata: hit.metadata,
                similarity_score: hit.score,
            })
            .collect();

        if chunks.is_empty() {
            tracing::info!("No chunks retrieved");
            return Ok(StateDelta {
                retrieved_chunks: Some(chunks),
                error: Some(NO_RESULTS_NOTE.to_string()),
                ..Default::default()
            });
        }

        tracing::info!(
            count = chunks.len(),
            top_score = chunks[0].similarity_score,
            "Chunks retrieved"
        );

        Ok(StateDelta {
            retrieved_chunks: Some(chunks),
            ..Default::default()
        })
    }
}
