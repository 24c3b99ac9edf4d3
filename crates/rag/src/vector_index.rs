//! Vector index abstraction.

use recall_core::AppResult;
use serde_json::{Map, Value};

/// One nearest-neighbour result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub content: String,
    pub metadata: Map<String, Value>,
    pub score: f32,
}

/// Similarity search over embedded corpus chunks.
///
/// Implementations embed the query text themselves and return at most
/// `top_k` hits, best first.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> AppResult<Vec<SearchHit>>;
}
