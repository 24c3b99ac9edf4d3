//! Lookup of authoritative source records.

use recall_core::AppResult;

use crate::types::{DocumentMetadata, MeetingMetadata};

/// Per-source-type record store.
///
/// `Ok(None)` means the id is unknown; `Err` means the store itself failed.
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_document_metadata(&self, id: &str) -> AppResult<Option<DocumentMetadata>>;

    async fn get_meeting_metadata(&self, id: &str) -> AppResult<Option<MeetingMetadata>>;
}
