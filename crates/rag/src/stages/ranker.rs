//! Composite relevance ranking.

use chrono::{DateTime, Utc};
use recall_core::AppResult;

use super::Stage;
use crate::dates::parse_timestamp;
use crate::state::{PipelineState, StateDelta};
use crate::types::{EnrichedChunk, SourceRecord};

const SIMILARITY_WEIGHT: f64 = 0.6;
const RECENCY_WEIGHT: f64 = 0.2;
const SOURCE_TYPE_WEIGHT: f64 = 0.2;

const MEETING_WEIGHT: f64 = 1.0;
const DOCUMENT_WEIGHT: f64 = 0.8;

/// Recency decays by a factor of e every this many days.
const RECENCY_DECAY_DAYS: f64 = 180.0;

/// Score used when a source date is missing or unreadable.
const NEUTRAL_RECENCY: f64 = 0.5;

/// Orders enriched chunks by composite score and keeps the best `top_k`.
pub struct ContextRanker {
    top_k: usize,
    now: Option<DateTime<Utc>>,
}

impl ContextRanker {
    pub fn new(top_k: usize) -> Self {
        Self { top_k, now: None }
    }

    /// Pin "now" instead of reading the clock on every run.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }
}

#[async_trait::async_trait]
impl Stage for ContextRanker {
    fn name(&self) -> &'static str {
        "context_ranker"
    }

    async fn run(&self, state: &PipelineState) -> AppResult<StateDelta> {
        let chunks = state.enriched_chunks.clone().unwrap_or_default();
        let input = chunks.len();
        let now = self.now.unwrap_or_else(Utc::now);

        let ranked = rank_chunks(chunks, self.top_k, now);

        tracing::info!(input, kept = ranked.len(), "Context ranked");

        Ok(StateDelta {
            ranked_context: Some(ranked),
            ..Default::default()
        })
    }
}

/// Sort by composite score, best first, and truncate to `top_k`.
///
/// The sort is stable, so equal scores keep their input order. A chunk
/// whose score is NaN or infinite sorts after every finite one.
pub fn rank_chunks(
    chunks: Vec<EnrichedChunk>,
    top_k: usize,
    now: DateTime<Utc>,
) -> Vec<EnrichedChunk> {
    if chunks.is_empty() {
        return chunks;
    }

    let mut scored: Vec<(f64, EnrichedChunk)> = chunks
        .into_iter()
        .map(|chunk| {
            let score = composite_score(&chunk, now);
            if !score.is_finite() {
                tracing::warn!(source_id = %chunk.source_id, "Non-finite score, ranking last");
                return (f64::NEG_INFINITY, chunk);
            }
            (score, chunk)
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (score, chunk) in &scored {
        tracing::debug!(source_id = %chunk.source_id, score, "Composite score");
    }

    scored
        .into_iter()
        .take(top_k)
        .map(|(_, chunk)| chunk)
        .collect()
}

/// `0.6 * similarity + 0.2 * recency + 0.2 * source type weight`.
pub fn composite_score(chunk: &EnrichedChunk, now: DateTime<Utc>) -> f64 {
    let type_weight = match chunk.source {
        SourceRecord::Meeting { .. } => MEETING_WEIGHT,
        SourceRecord::Document { .. } => DOCUMENT_WEIGHT,
    };

    SIMILARITY_WEIGHT * f64::from(chunk.similarity_score)
        + RECENCY_WEIGHT * recency_score(chunk.source.date(), now)
        + SOURCE_TYPE_WEIGHT * type_weight
}

/// `exp(-days / 180)` clamped to [0, 1]; 0.5 when the date can't be read.
pub fn recency_score(date: &str, now: DateTime<Utc>) -> f64 {
    let Some(then) = parse_timestamp(date) else {
        return NEUTRAL_RECENCY;
    };

    let days = (now - then).num_seconds() as f64 / 86_400.0;
    (-days / RECENCY_DECAY_DAYS).exp().clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentMetadata, MeetingMetadata};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn document(id: &str, similarity: f32, upload_date: &str) -> EnrichedChunk {
        EnrichedChunk {
            content: format!("content of {}", id),
            excerpt: format!("content of {}", id),
            similarity_score: similarity,
            source_id: id.to_string(),
            chunk_index: None,
            source: SourceRecord::Document {
                metadata: DocumentMetadata {
                    id: id.to_string(),
                    document_name: format!("{}.pdf", id),
                    file_url: format!("https://files.example/{}.pdf", id),
                    upload_date: upload_date.to_string(),
                    uploaded_by: None,
                    category: None,
                    file_type: None,
                    page_count: None,
                },
                page_number: None,
            },
        }
    }

    fn meeting(id: &str, similarity: f32, meeting_date: &str) -> EnrichedChunk {
        EnrichedChunk {
            content: format!("notes of {}", id),
            excerpt: format!("notes of {}", id),
            similarity_score: similarity,
            source_id: id.to_string(),
            chunk_index: None,
            source: SourceRecord::Meeting {
                metadata: MeetingMetadata {
                    id: id.to_string(),
                    meeting_title: format!("Meeting {}", id),
                    meeting_date: meeting_date.to_string(),
                    transcript_url: None,
                    recording_url: None,
                    participants: Vec::new(),
                    meeting_type: None,
                    duration_minutes: None,
                },
                timestamp: None,
            },
        }
    }

    #[test]
    fn test_same_day_meeting_composite() {
        let chunk = meeting("m1", 0.9, &now().to_rfc3339());
        let score = composite_score(&chunk, now());
        assert!((score - 0.94).abs() < 1e-6, "got {}", score);
    }

    #[test]
    fn test_recency_after_180_days() {
        let date = (now() - Duration::days(180)).to_rfc3339();
        let score = recency_score(&date, now());
        assert!((score - 0.3679).abs() < 1e-3, "got {}", score);
    }

    #[test]
    fn test_recency_neutral_for_bad_dates() {
        assert_eq!(recency_score("", now()), 0.5);
        assert_eq!(recency_score("not a date", now()), 0.5);
    }

    #[test]
    fn test_future_date_clamped() {
        assert_eq!(recency_score("2030-01-01", now()), 1.0);
    }

    #[test]
    fn test_meeting_outranks_equal_document() {
        let date = "2024-06-01";
        let ranked = rank_chunks(
            vec![document("d1", 0.8, date), meeting("m1", 0.8, date)],
            5,
            now(),
        );
        assert_eq!(ranked[0].source_id, "m1");
        assert_eq!(ranked[1].source_id, "d1");
    }

    #[test]
    fn test_output_sorted_and_bounded() {
        let chunks = vec![
            document("d1", 0.2, "2023-01-01"),
            meeting("m1", 0.95, "2024-05-30"),
            document("d2", 0.7, "2024-05-01"),
            meeting("m2", 0.4, "bogus"),
            document("d3", 0.9, "2024-05-31"),
        ];

        let ranked = rank_chunks(chunks, 3, now());
        assert_eq!(ranked.len(), 3);

        let scores: Vec<f64> = ranked.iter().map(|c| composite_score(c, now())).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(ranked[0].source_id, "m1");
    }

    #[test]
    fn test_top_k_larger_than_input() {
        let ranked = rank_chunks(vec![document("d1", 0.5, "2024-01-01")], 10, now());
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let date = "2024-05-01";
        let chunks = vec![
            document("first", 0.5, date),
            document("second", 0.5, date),
            document("third", 0.5, date),
        ];

        let ranked = rank_chunks(chunks, 3, now());
        let ids: Vec<&str> = ranked.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_nan_similarity_ranks_last() {
        let date = "2024-05-01";
        let chunks = vec![
            document("low", 0.1, date),
            document("nan", f32::NAN, date),
            document("high", 0.9, date),
        ];

        let ranked = rank_chunks(chunks, 3, now());
        let ids: Vec<&str> = ranked.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low", "nan"]);

        let top_two = rank_chunks(
            vec![
                document("nan", f32::NAN, date),
                document("low", 0.1, date),
                document("high", 0.9, date),
            ],
            2,
            now(),
        );
        let ids: Vec<&str> = top_two.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(rank_chunks(Vec::new(), 5, now()).is_empty());
    }
}
