//! Command handlers for the Recall CLI.

pub mod ask;
pub mod prompts;
pub mod stats;

pub use ask::AskCommand;
pub use prompts::PromptsCommand;
pub use stats::StatsCommand;

use std::sync::Arc;

use recall_core::{config::AppConfig, AppResult};
use recall_rag::{embeddings::create_provider, SqliteKnowledgeStore};

/// Open the workspace corpus with the configured query embedder.
pub(crate) fn open_store(config: &AppConfig) -> AppResult<Arc<SqliteKnowledgeStore>> {
    let embedder = create_provider(&config.store.embedding)?;
    let path = config.store_path();
    tracing::debug!("Opening corpus at {:?}", path);
    Ok(Arc::new(SqliteKnowledgeStore::open(&path, embedder)?))
}
