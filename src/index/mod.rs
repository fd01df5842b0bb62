//! Vector index — owns `(id, content, embedding, metadata)` records and
//! supports batched upserts plus top-k similarity search, optionally
//! scoped to one document.

mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;
use crate::ingest::Chunk;

pub use sqlite::SqliteVectorIndex;

/// Maximum records written per backend call.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// One indexed record per chunk. The embedding is computed once at upload
/// time and never recomputed unless the record is re-uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub document_id: String,
    pub metadata: Value,
}

impl IndexedRecord {
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.id.clone(),
            content: chunk.text.clone(),
            embedding,
            document_id: chunk.metadata.document_id.clone(),
            metadata: serde_json::to_value(&chunk.metadata).unwrap_or(Value::Null),
        }
    }
}

/// Ephemeral result of a similarity search; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub text: String,
    pub metadata: Value,
    /// Similarity score, higher = more relevant.
    pub score: f32,
}

impl RetrievalResult {
    /// The `source` filename recorded in chunk metadata, if any.
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
    }
}

/// Abstract vector-capable search store.
///
/// Backend errors surface as [`ApiError::IndexUnavailable`]; no component
/// retries internally — retry policy belongs to callers, since repeated
/// embedding calls are costly.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotently provision the backing collection. Never destructive:
    /// an incompatible existing schema (e.g. embedding dimension mismatch)
    /// is reported as an error naming [`VectorIndex::reset`] instead of
    /// being recreated automatically.
    async fn ensure_schema(&self) -> Result<(), ApiError>;

    /// Write records in batches of at most [`UPSERT_BATCH_SIZE`]. Batches
    /// are sequential and earlier batches are not rolled back on failure;
    /// a failure reports the zero-based failing batch index and how many
    /// batches committed.
    async fn upsert_batch(&self, records: &[IndexedRecord]) -> Result<(), ApiError>;

    /// Top-k search by descending similarity. When `document_id` is set,
    /// only that document's chunks are eligible.
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<RetrievalResult>, ApiError>;

    /// Purge all records belonging to a document. Returns the number of
    /// records removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize, ApiError>;

    /// Record count, optionally scoped to one document.
    async fn count(&self, document_id: Option<&str>) -> Result<usize, ApiError>;

    /// Destructive, operator-invoked migration: drop and re-provision the
    /// collection. Never called automatically at startup.
    async fn reset(&self) -> Result<(), ApiError>;
}
