//! Error types for Recall.
//!
//! A single error enum covers every failure category in the workspace.
//! Pipeline callers distinguish fatal retrieval failures from fatal
//! generation failures by variant, and by the stable code each variant
//! maps to.

use thiserror::Error;

/// Unified error type for Recall.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport, API status, malformed payloads)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Vector index failures; fatal for a pipeline run
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Answer synthesis failures; fatal for a pipeline run
    #[error("Generation error: {0}")]
    Generation(String),

    /// Metadata store errors
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// A request exceeded its deadline
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Stable internal code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Llm(_) => "LLM_ERROR",
            AppError::Retrieval(_) => "RETRIEVAL_ERROR",
            AppError::Generation(_) => "GENERATION_ERROR",
            AppError::Metadata(_) => "METADATA_ERROR",
            AppError::Prompt(_) => "PROMPT_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Other(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_pipeline_errors_have_distinct_codes() {
        let retrieval = AppError::Retrieval("index unreachable".to_string());
        let generation = AppError::Generation("model unreachable".to_string());

        assert_eq!(retrieval.code(), "RETRIEVAL_ERROR");
        assert_eq!(generation.code(), "GENERATION_ERROR");
        assert_ne!(retrieval.code(), generation.code());
    }

    #[test]
    fn test_display_includes_category() {
        let err = AppError::Timeout(30);
        assert_eq!(err.to_string(), "Timed out after 30 seconds");

        let err = AppError::Metadata("row missing".to_string());
        assert!(err.to_string().starts_with("Metadata error"));
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AppError = parse_err.into();
        assert_eq!(err.code(), "SERIALIZATION_ERROR");
    }
}
