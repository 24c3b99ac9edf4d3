//! The six pipeline stages.
//!
//! Each stage reads the state, never mutates it, and returns the fields it
//! owns as a [`StateDelta`]. Missing upstream fields are treated as empty.

pub mod enricher;
pub mod formatter;
pub mod generator;
pub mod query_analyzer;
pub mod ranker;
pub mod retrieval;

pub use enricher::MetadataEnricher;
pub use formatter::SourceFormatter;
pub use generator::ResponseGenerator;
pub use query_analyzer::QueryAnalyzer;
pub use ranker::ContextRanker;
pub use retrieval::RetrievalAgent;

use recall_core::AppResult;

use crate::state::{PipelineState, StateDelta};

/// A single step of the pipeline.
///
/// Returning `Err` aborts the run; soft problems go into `StateDelta::error`
/// or simply produce empty output.
#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn run(&self, state: &PipelineState) -> AppResult<StateDelta>;
}
