//! Final answer assembly with citations and a confidence label.

use recall_core::AppResult;

use super::Stage;
use crate::state::{PipelineState, StateDelta};
use crate::types::{ChatResponse, Confidence, EnrichedChunk, Source, SourceDetails, SourceRecord};

pub const NO_ANSWER: &str = "Unable to generate answer";

pub struct SourceFormatter {
    threshold_high: f32,
    threshold_medium: f32,
}

impl SourceFormatter {
    pub fn new(threshold_high: f32, threshold_medium: f32) -> Self {
        Self {
            threshold_high,
            threshold_medium,
        }
    }

    pub fn format(&self, answer: Option<&str>, ranked: &[EnrichedChunk]) -> ChatResponse {
        let Some(answer) = answer else {
            tracing::warn!("No answer to format");
            return ChatResponse {
                answer: NO_ANSWER.to_string(),
                sources: Vec::new(),
                confidence: Confidence::Low,
            };
        };

        if ranked.is_empty() {
            return ChatResponse {
                answer: answer.to_string(),
                sources: Vec::new(),
                confidence: Confidence::Low,
            };
        }

        let sources: Vec<Source> = ranked.iter().map(to_source).collect();

        let mean = sources.iter().map(|s| s.relevance_score).sum::<f32>() / sources.len() as f32;
        let confidence = calculate_confidence(
            mean,
            sources.len(),
            self.threshold_high,
            self.threshold_medium,
        );

        tracing::info!(
            sources = sources.len(),
            mean_relevance = mean,
            confidence = confidence.as_str(),
            "Response formatted"
        );

        ChatResponse {
            answer: answer.to_string(),
            sources,
            confidence,
        }
    }
}

#[async_trait::async_trait]
impl Stage for SourceFormatter {
    fn name(&self) -> &'static str {
        "source_formatter"
    }

    async fn run(&self, state: &PipelineState) -> AppResult<StateDelta> {
        let ranked = state.ranked_context.as_deref().unwrap_or_default();
        let response = self.format(state.generated_answer.as_deref(), ranked);

        Ok(StateDelta {
            formatted_response: Some(response),
            ..Default::default()
        })
    }
}

/// `high` needs a strong mean and at least two sources; `medium` needs a
/// decent mean or at least three sources.
pub fn calculate_confidence(
    mean_relevance: f32,
    source_count: usize,
    threshold_high: f32,
    threshold_medium: f32,
) -> Confidence {
    if mean_relevance >= threshold_high && source_count >= 2 {
        Confidence::High
    } else if mean_relevance >= threshold_medium || source_count >= 3 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

fn to_source(chunk: &EnrichedChunk) -> Source {
    let metadata = match &chunk.source {
        SourceRecord::Document {
            metadata,
            page_number,
        } => SourceDetails {
            uploaded_by: metadata.uploaded_by.clone(),
            category: metadata.category.clone(),
            page_number: *page_number,
            file_type: metadata.file_type.clone(),
            page_count: metadata.page_count,
            ..Default::default()
        },
        SourceRecord::Meeting {
            metadata,
            timestamp,
        } => SourceDetails {
            participants: Some(metadata.participants.clone()),
            meeting_type: metadata.meeting_type.clone(),
            timestamp: timestamp.clone(),
            duration_minutes: metadata.duration_minutes,
            ..Default::default()
        },
    };

    Source {
        source_type: chunk.source.source_type(),
        name: chunk.source.name().to_string(),
        date: chunk.source.date().to_string(),
        url: chunk.source.url().to_string(),
        excerpt: chunk.excerpt.clone(),
        relevance_score: chunk.similarity_score,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentMetadata, MeetingMetadata, SourceType};

    fn doc(similarity: f32) -> EnrichedChunk {
        EnrichedChunk {
            content: "Pricing is per seat.".to_string(),
            excerpt: "Pricing is per seat.".to_string(),
            similarity_score: similarity,
            source_id: "d1".to_string(),
            chunk_index: None,
            source: SourceRecord::Document {
                metadata: DocumentMetadata {
                    id: "d1".to_string(),
                    document_name: "Pricing.pdf".to_string(),
                    file_url: "https://files.example/pricing.pdf".to_string(),
                    upload_date: "2024-04-02".to_string(),
                    uploaded_by: Some("ops".to_string()),
                    category: None,
                    file_type: Some("pdf".to_string()),
                    page_count: Some(4),
                },
                page_number: Some(2),
            },
        }
    }

    fn meeting(similarity: f32) -> EnrichedChunk {
        EnrichedChunk {
            content: "Seat pricing confirmed.".to_string(),
            excerpt: "Seat pricing confirmed.".to_string(),
            similarity_score: similarity,
            source_id: "m1".to_string(),
            chunk_index: None,
            source: SourceRecord::Meeting {
                metadata: MeetingMetadata {
                    id: "m1".to_string(),
                    meeting_title: "Pricing review".to_string(),
                    meeting_date: "2024-04-05".to_string(),
                    transcript_url: None,
                    recording_url: None,
                    participants: vec!["Sam".to_string()],
                    meeting_type: None,
                    duration_minutes: Some(25),
                },
                timestamp: Some("00:03:10".to_string()),
            },
        }
    }

    #[test]
    fn test_confidence_table() {
        assert_eq!(calculate_confidence(0.85, 2, 0.8, 0.6), Confidence::High);
        assert_eq!(calculate_confidence(0.65, 1, 0.8, 0.6), Confidence::Medium);
        assert_eq!(calculate_confidence(0.3, 1, 0.8, 0.6), Confidence::Low);
        // Strong mean but a single source is not enough for high
        assert_eq!(calculate_confidence(0.95, 1, 0.8, 0.6), Confidence::Medium);
        // Many weak sources still count as medium
        assert_eq!(calculate_confidence(0.2, 3, 0.8, 0.6), Confidence::Medium);
    }

    #[test]
    fn test_no_answer() {
        let formatter = SourceFormatter::new(0.8, 0.6);
        let response = formatter.format(None, &[doc(0.9)]);
        assert_eq!(response.answer, NO_ANSWER);
        assert!(response.sources.is_empty());
        assert_eq!(response.confidence, Confidence::Low);
    }

    #[test]
    fn test_no_context_passes_answer_through() {
        let formatter = SourceFormatter::new(0.8, 0.6);
        let response = formatter.format(Some("Nothing relevant."), &[]);
        assert_eq!(response.answer, "Nothing relevant.");
        assert!(response.sources.is_empty());
        assert_eq!(response.confidence, Confidence::Low);
    }

    #[test]
    fn test_sources_follow_ranked_order() {
        let formatter = SourceFormatter::new(0.8, 0.6);
        let response = formatter.format(Some("Per seat."), &[meeting(0.9), doc(0.85)]);

        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].source_type, SourceType::Meeting);
        assert_eq!(response.sources[0].url, "");
        assert_eq!(response.sources[0].metadata.timestamp.as_deref(), Some("00:03:10"));
        assert_eq!(response.sources[1].name, "Pricing.pdf");
        assert_eq!(response.sources[1].metadata.page_number, Some(2));
        assert!(response.sources[1].metadata.participants.is_none());
        assert_eq!(response.confidence, Confidence::High);
    }
}
