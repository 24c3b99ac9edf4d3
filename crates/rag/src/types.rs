//! Data model for the question-answering pipeline.

use chrono::NaiveDate;
use recall_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dates;

/// Intent of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    Factual,
    Timeline,
    Decision,
    Technical,
}

impl QueryType {
    /// Parse a query type name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "factual" => Some(Self::Factual),
            "timeline" => Some(Self::Timeline),
            "decision" => Some(Self::Decision),
            "technical" => Some(Self::Technical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Timeline => "timeline",
            Self::Decision => "decision",
            Self::Technical => "technical",
        }
    }
}

/// One end of a timeframe extracted from a question.
///
/// A bound the model produced but that does not parse is kept as
/// `Invalid` with the raw text, so callers can tell "the user named a
/// period we could not read" apart from "no period given".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DateBound {
    Date(NaiveDate),
    Invalid(String),
}

impl DateBound {
    /// Parse `YYYY-MM-DD` or an ISO date-time; anything else is `Invalid`.
    pub fn parse(raw: &str) -> Self {
        match dates::parse_date(raw) {
            Some(date) => Self::Date(date),
            None => Self::Invalid(raw.to_string()),
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            Self::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Date(_))
    }
}

/// Date range mentioned in a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeframe {
    pub start: DateBound,
    pub end: DateBound,
}

impl Timeframe {
    /// True only when both bounds parsed.
    pub fn is_valid(&self) -> bool {
        self.start.is_valid() && self.end.is_valid()
    }
}

/// Structured reading of a question, produced once per run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalysis {
    pub query_type: QueryType,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_meeting: Option<String>,
}

impl QueryAnalysis {
    /// Deterministic analysis used when the model output is unusable.
    ///
    /// Keywords are the lower-cased whitespace tokens longer than three
    /// characters, in order, duplicates kept.
    pub fn fallback(query: &str) -> Self {
        let keywords = query
            .split_whitespace()
            .map(|token| token.to_lowercase())
            .filter(|token| token.chars().count() > 3)
            .collect();

        Self {
            query_type: QueryType::Factual,
            keywords,
            ..Default::default()
        }
    }
}

/// Kind of record a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Document,
    Meeting,
}

impl SourceType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "document" => Some(Self::Document),
            "meeting" => Some(Self::Meeting),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Meeting => "meeting",
        }
    }
}

/// A raw hit from the vector index.
///
/// `embedding_metadata` is whatever the ingester stored next to the vector.
/// It should carry `source_id` and `source_type`, and may carry
/// `page_number`, `timestamp` and `chunk_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub embedding_metadata: Map<String, Value>,
    /// Index-native score, passed through unchanged.
    pub similarity_score: f32,
}

/// Authoritative document record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: String,
    pub document_name: String,
    pub file_url: String,
    pub upload_date: String,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
}

/// Authoritative meeting record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingMetadata {
    pub id: String,
    pub meeting_title: String,
    pub meeting_date: String,
    #[serde(default)]
    pub transcript_url: Option<String>,
    #[serde(default)]
    pub recording_url: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub meeting_type: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

/// Resolved source of a chunk, with the chunk's position inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceRecord {
    Document {
        metadata: DocumentMetadata,
        page_number: Option<u32>,
    },
    Meeting {
        metadata: MeetingMetadata,
        timestamp: Option<String>,
    },
}

impl SourceRecord {
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Document { .. } => SourceType::Document,
            Self::Meeting { .. } => SourceType::Meeting,
        }
    }

    /// Document name or meeting title.
    pub fn name(&self) -> &str {
        match self {
            Self::Document { metadata, .. } => &metadata.document_name,
            Self::Meeting { metadata, .. } => &metadata.meeting_title,
        }
    }

    /// Upload date or meeting date, as stored.
    pub fn date(&self) -> &str {
        match self {
            Self::Document { metadata, .. } => &metadata.upload_date,
            Self::Meeting { metadata, .. } => &metadata.meeting_date,
        }
    }

    /// Link to the original. Meetings prefer the transcript over the recording.
    pub fn url(&self) -> &str {
        match self {
            Self::Document { metadata, .. } => &metadata.file_url,
            Self::Meeting { metadata, .. } => [&metadata.transcript_url, &metadata.recording_url]
                .into_iter()
                .flatten()
                .map(String::as_str)
                .find(|url| !url.is_empty())
                .unwrap_or(""),
        }
    }
}

/// A retrieved chunk joined with its source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedChunk {
    pub content: String,
    pub excerpt: String,
    pub similarity_score: f32,
    pub source_id: String,
    pub chunk_index: Option<u32>,
    pub source: SourceRecord,
}

/// Discrete confidence label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Type-specific citation fields. Only the fields of the source's kind are set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

/// A citation attached to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub name: String,
    pub date: String,
    pub url: String,
    pub excerpt: String,
    pub relevance_score: f32,
    pub metadata: SourceDetails,
}

/// Final answer returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub confidence: Confidence,
}

/// What a caller shows when a run fails: a generic message plus a code.
///
/// Internal detail stays in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
}

impl ErrorBody {
    pub fn from_error(err: &AppError) -> Self {
        let message = match err {
            AppError::Retrieval(_) => "Failed to search the knowledge base",
            AppError::Generation(_) | AppError::Llm(_) => "Failed to generate a response",
            AppError::Timeout(_) => "The request took too long to complete",
            AppError::Config(_) => "The service is not configured correctly",
            _ => "Internal server error",
        };

        Self {
            message: message.to_string(),
            code: err.code().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_type_parse() {
        assert_eq!(QueryType::parse("Timeline"), Some(QueryType::Timeline));
        assert_eq!(QueryType::parse(" decision "), Some(QueryType::Decision));
        assert_eq!(QueryType::parse("opinion"), None);
    }

    #[test]
    fn test_fallback_keywords() {
        let analysis = QueryAnalysis::fallback("What did Alice say about the Pricing pricing plan?");
        assert_eq!(analysis.query_type, QueryType::Factual);
        assert_eq!(
            analysis.keywords,
            vec!["what", "alice", "about", "pricing", "pricing", "plan?"]
        );
        assert!(analysis.timeframe.is_none());
    }

    #[test]
    fn test_fallback_counts_characters_not_bytes() {
        // "été" is 3 characters but 5 bytes
        let analysis = QueryAnalysis::fallback("été réunion");
        assert_eq!(analysis.keywords, vec!["réunion"]);
    }

    #[test]
    fn test_date_bound_distinguishes_invalid() {
        let valid = DateBound::parse("2024-01-15");
        let from_datetime = DateBound::parse("2024-01-15T09:30:00Z");
        let invalid = DateBound::parse("sometime in Q3");

        assert_eq!(valid.date(), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(valid, from_datetime);
        assert_eq!(invalid, DateBound::Invalid("sometime in Q3".to_string()));

        let timeframe = Timeframe {
            start: valid,
            end: invalid,
        };
        assert!(!timeframe.is_valid());
    }

    #[test]
    fn test_meeting_url_preference() {
        let mut meeting = MeetingMetadata {
            id: "m1".to_string(),
            meeting_title: "Kickoff".to_string(),
            meeting_date: "2024-01-15".to_string(),
            transcript_url: Some("https://t".to_string()),
            recording_url: Some("https://r".to_string()),
            participants: vec![],
            meeting_type: None,
            duration_minutes: None,
        };

        let record = SourceRecord::Meeting {
            metadata: meeting.clone(),
            timestamp: None,
        };
        assert_eq!(record.url(), "https://t");

        meeting.transcript_url = None;
        let record = SourceRecord::Meeting {
            metadata: meeting.clone(),
            timestamp: None,
        };
        assert_eq!(record.url(), "https://r");

        meeting.recording_url = None;
        let record = SourceRecord::Meeting {
            metadata: meeting,
            timestamp: None,
        };
        assert_eq!(record.url(), "");
    }

    #[test]
    fn test_source_serializes_camel_case() {
        let source = Source {
            source_type: SourceType::Meeting,
            name: "Kickoff".to_string(),
            date: "2024-01-15".to_string(),
            url: String::new(),
            excerpt: "We agreed".to_string(),
            relevance_score: 0.9,
            metadata: SourceDetails {
                meeting_type: Some("client".to_string()),
                duration_minutes: Some(45),
                ..Default::default()
            },
        };

        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["type"], "meeting");
        assert!(json.get("relevanceScore").is_some());
        assert_eq!(json["metadata"]["meetingType"], "client");
        assert_eq!(json["metadata"]["durationMinutes"], 45);
        assert!(json["metadata"].get("uploadedBy").is_none());
    }

    #[test]
    fn test_error_body_hides_detail() {
        let err = AppError::Retrieval("connection refused at 10.0.0.5:5432".to_string());
        let body = ErrorBody::from_error(&err);

        assert_eq!(body.code, "RETRIEVAL_ERROR");
        assert!(!body.message.contains("10.0.0.5"));

        let body = ErrorBody::from_error(&AppError::Generation("500".to_string()));
        assert_eq!(body.code, "GENERATION_ERROR");
    }
}
