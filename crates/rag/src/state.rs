//! Pipeline state and the partial updates stages return.

use serde::Serialize;

use crate::types::{ChatResponse, EnrichedChunk, QueryAnalysis, RetrievedChunk};

/// Everything known about one question so far.
///
/// The query is fixed at construction. Every other field starts empty and
/// is filled by the stage that owns it.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    query: String,
    pub query_analysis: Option<QueryAnalysis>,
    pub retrieved_chunks: Option<Vec<RetrievedChunk>>,
    pub enriched_chunks: Option<Vec<EnrichedChunk>>,
    pub ranked_context: Option<Vec<EnrichedChunk>>,
    pub generated_answer: Option<String>,
    pub formatted_response: Option<ChatResponse>,
    /// Human-readable note about a soft failure, never a fatal error.
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Fold a stage's output into the state.
    ///
    /// A `Some` replaces the field; `None` leaves it as it was.
    pub fn merge(&mut self, delta: StateDelta) {
        let StateDelta {
            query_analysis,
            retrieved_chunks,
            enriched_chunks,
            ranked_context,
            generated_answer,
            formatted_response,
            error,
        } = delta;

        if query_analysis.is_some() {
            self.query_analysis = query_analysis;
        }
        if retrieved_chunks.is_some() {
            self.retrieved_chunks = retrieved_chunks;
        }
        if enriched_chunks.is_some() {
            self.enriched_chunks = enriched_chunks;
        }
        if ranked_context.is_some() {
            self.ranked_context = ranked_context;
        }
        if generated_answer.is_some() {
            self.generated_answer = generated_answer;
        }
        if formatted_response.is_some() {
            self.formatted_response = formatted_response;
        }
        if error.is_some() {
            self.error = error;
        }
    }
}

/// Fields a stage wants to set. The query is not among them.
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    pub query_analysis: Option<QueryAnalysis>,
    pub retrieved_chunks: Option<Vec<RetrievedChunk>>,
    pub enriched_chunks: Option<Vec<EnrichedChunk>>,
    pub ranked_context: Option<Vec<EnrichedChunk>>,
    pub generated_answer: Option<String>,
    pub formatted_response: Option<ChatResponse>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_only_touches_set_fields() {
        let mut state = PipelineState::new("when is launch?");
        state.merge(StateDelta {
            generated_answer: Some("Friday".to_string()),
            error: Some("first".to_string()),
            ..Default::default()
        });

        state.merge(StateDelta {
            retrieved_chunks: Some(Vec::new()),
            ..Default::default()
        });

        assert_eq!(state.query(), "when is launch?");
        assert_eq!(state.generated_answer.as_deref(), Some("Friday"));
        assert_eq!(state.error.as_deref(), Some("first"));
        assert_eq!(state.retrieved_chunks, Some(Vec::new()));
        assert!(state.enriched_chunks.is_none());
    }

    #[test]
    fn test_later_delta_wins() {
        let mut state = PipelineState::new("q");
        state.merge(StateDelta {
            error: Some("first".to_string()),
            ..Default::default()
        });
        state.merge(StateDelta {
            error: Some("second".to_string()),
            ..Default::default()
        });
        assert_eq!(state.error.as_deref(), Some("second"));
    }
}
