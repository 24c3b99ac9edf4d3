//! Cited question answering over documents and meeting transcripts.
//!
//! A question flows through six stages: analysis, retrieval, metadata
//! enrichment, ranking, generation and formatting. The vector index, the
//! metadata store and the language model are injected as traits.
//! [`SqliteKnowledgeStore`] provides a local implementation of the first two.

pub mod dates;
pub mod embeddings;
pub mod metadata_store;
pub mod pipeline;
pub mod sqlite_store;
pub mod stages;
pub mod state;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use metadata_store::MetadataStore;
pub use pipeline::{PipelineDeps, RagPipeline};
pub use sqlite_store::{CorpusStats, SqliteKnowledgeStore};
pub use state::{PipelineState, StateDelta};
pub use types::{
    ChatResponse, Confidence, DateBound, DocumentMetadata, EnrichedChunk, ErrorBody,
    MeetingMetadata, QueryAnalysis, QueryType, RetrievedChunk, Source, SourceDetails,
    SourceRecord, SourceType, Timeframe,
};
pub use vector_index::{SearchHit, VectorIndex};
