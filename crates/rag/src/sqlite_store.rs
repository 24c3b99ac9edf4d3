//! SQLite-backed corpus: source records plus embedded chunks in one file.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use recall_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::embeddings::EmbeddingProvider;
use crate::metadata_store::MetadataStore;
use crate::types::{DocumentMetadata, MeetingMetadata};
use crate::vector_index::{SearchHit, VectorIndex};

/// Row counts per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub documents: u64,
    pub meetings: u64,
    pub chunks: u64,
}

/// Local knowledge store.
///
/// Serves both source-record lookups and brute-force cosine search over
/// every stored chunk embedding. Query text is embedded with the same
/// provider the corpus was built with.
pub struct SqliteKnowledgeStore {
    conn: Mutex<Connection>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for SqliteKnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKnowledgeStore")
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

impl SqliteKnowledgeStore {
    /// Open (or create) the store at `db_path`.
    pub fn open(db_path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Metadata(format!("Failed to open SQLite store: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS client_documents (
                id TEXT PRIMARY KEY,
                document_name TEXT NOT NULL,
                file_url TEXT NOT NULL,
                upload_date TEXT NOT NULL,
                uploaded_by TEXT,
                category TEXT,
                file_type TEXT,
                page_count INTEGER
            );

            CREATE TABLE IF NOT EXISTS meeting_transcripts (
                id TEXT PRIMARY KEY,
                meeting_title TEXT NOT NULL,
                meeting_date TEXT NOT NULL,
                transcript_url TEXT,
                recording_url TEXT,
                participants TEXT NOT NULL DEFAULT '[]',
                meeting_type TEXT,
                duration_minutes INTEGER
            );

            CREATE TABLE IF NOT EXISTS document_embeddings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding BLOB NOT NULL
            );
            "#,
        )
        .map_err(|e| AppError::Metadata(format!("Failed to create tables: {}", e)))?;

        tracing::debug!(
            path = %db_path.display(),
            embedder = embedder.provider_name(),
            "Opened SQLite knowledge store"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Other("SQLite connection lock poisoned".to_string()))
    }

    pub fn insert_document(&self, doc: &DocumentMetadata) -> AppResult<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO client_documents
                 (id, document_name, file_url, upload_date, uploaded_by, category, file_type, page_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    doc.id,
                    doc.document_name,
                    doc.file_url,
                    doc.upload_date,
                    doc.uploaded_by,
                    doc.category,
                    doc.file_type,
                    doc.page_count,
                ],
            )
            .map_err(|e| AppError::Metadata(format!("Failed to insert document: {}", e)))?;
        Ok(())
    }

    pub fn insert_meeting(&self, meeting: &MeetingMetadata) -> AppResult<()> {
        let participants = serde_json::to_string(&meeting.participants)?;

        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO meeting_transcripts
                 (id, meeting_title, meeting_date, transcript_url, recording_url, participants, meeting_type, duration_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    meeting.id,
                    meeting.meeting_title,
                    meeting.meeting_date,
                    meeting.transcript_url,
                    meeting.recording_url,
                    participants,
                    meeting.meeting_type,
                    meeting.duration_minutes,
                ],
            )
            .map_err(|e| AppError::Metadata(format!("Failed to insert meeting: {}", e)))?;
        Ok(())
    }

    /// Store a chunk with a precomputed embedding.
    pub fn insert_chunk(
        &self,
        content: &str,
        metadata: &Map<String, Value>,
        embedding: &[f32],
    ) -> AppResult<()> {
        let metadata_json = serde_json::to_string(metadata)?;

        self.conn()?
            .execute(
                "INSERT INTO document_embeddings (content, metadata, embedding) VALUES (?1, ?2, ?3)",
                params![content, metadata_json, embedding_to_bytes(embedding)],
            )
            .map_err(|e| AppError::Metadata(format!("Failed to insert chunk: {}", e)))?;
        Ok(())
    }

    /// Embed `content` with the store's provider, then store it.
    pub async fn embed_and_insert_chunk(
        &self,
        content: &str,
        metadata: &Map<String, Value>,
    ) -> AppResult<()> {
        let embedding = self.embedder.embed(content).await?;
        self.insert_chunk(content, metadata, &embedding)
    }

    pub fn stats(&self) -> AppResult<CorpusStats> {
        let conn = self.conn()?;
        let count = |table: &str| -> AppResult<u64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
            .map_err(|e| AppError::Metadata(format!("Failed to count {}: {}", table, e)))
        };

        Ok(CorpusStats {
            documents: count("client_documents")?,
            meetings: count("meeting_transcripts")?,
            chunks: count("document_embeddings")?,
        })
    }

    fn nearest(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<SearchHit>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, content, metadata, embedding FROM document_embeddings")
            .map_err(|e| AppError::Retrieval(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })
            .map_err(|e| AppError::Retrieval(format!("Failed to query chunks: {}", e)))?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, content, metadata_json, blob) =
                row.map_err(|e| AppError::Retrieval(format!("Failed to read chunk: {}", e)))?;

            let Some(embedding) = bytes_to_embedding(&blob) else {
                tracing::warn!(chunk_id = id, "Skipping chunk with malformed embedding");
                continue;
            };

            let metadata = match serde_json::from_str::<Map<String, Value>>(&metadata_json) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(chunk_id = id, error = %e, "Skipping chunk with malformed metadata");
                    continue;
                }
            };

            let score = cosine_similarity(query_embedding, &embedding);
            if !score.is_finite() {
                tracing::warn!(chunk_id = id, "Skipping chunk with non-finite similarity");
                continue;
            }

            hits.push(SearchHit {
                score,
                content,
                metadata,
            });
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);

        tracing::debug!("Retrieved {} chunks (requested top-{})", hits.len(), top_k);
        Ok(hits)
    }
}

#[async_trait::async_trait]
impl VectorIndex for SqliteKnowledgeStore {
    async fn search(&self, query: &str, top_k: usize) -> AppResult<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to embed query: {}", e)))?;

        self.nearest(&query_embedding, top_k)
    }
}

#[async_trait::async_trait]
impl MetadataStore for SqliteKnowledgeStore {
    async fn get_document_metadata(&self, id: &str) -> AppResult<Option<DocumentMetadata>> {
        self.conn()?
            .query_row(
                "SELECT id, document_name, file_url, upload_date, uploaded_by, category, file_type, page_count
                 FROM client_documents WHERE id = ?1",
                params![id],
                |row| {
                    Ok(DocumentMetadata {
                        id: row.get(0)?,
                        document_name: row.get(1)?,
                        file_url: row.get(2)?,
                        upload_date: row.get(3)?,
                        uploaded_by: row.get(4)?,
                        category: row.get(5)?,
                        file_type: row.get(6)?,
                        page_count: row.get(7)?,
                    })
                },
            )
            .optional()
            .map_err(|e| AppError::Metadata(format!("Failed to load document {}: {}", id, e)))
    }

    async fn get_meeting_metadata(&self, id: &str) -> AppResult<Option<MeetingMetadata>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, meeting_title, meeting_date, transcript_url, recording_url, participants, meeting_type, duration_minutes
                 FROM meeting_transcripts WHERE id = ?1",
                params![id],
                |row| {
                    let meeting = MeetingMetadata {
                        id: row.get(0)?,
                        meeting_title: row.get(1)?,
                        meeting_date: row.get(2)?,
                        transcript_url: row.get(3)?,
                        recording_url: row.get(4)?,
                        participants: Vec::new(),
                        meeting_type: row.get(6)?,
                        duration_minutes: row.get(7)?,
                    };
                    Ok((meeting, row.get::<_, String>(5)?))
                },
            )
            .optional()
            .map_err(|e| AppError::Metadata(format!("Failed to load meeting {}: {}", id, e)))?;

        row.map(|(mut meeting, participants)| {
            meeting.participants = serde_json::from_str(&participants).map_err(|e| {
                AppError::Metadata(format!("Bad participants for meeting {}: {}", id, e))
            })?;
            Ok(meeting)
        })
        .transpose()
    }
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to an embedding vector; `None` if the length is off.
fn bytes_to_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }

    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
