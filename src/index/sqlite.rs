//! SQLite-backed vector index.
//!
//! Stores chunk text + metadata in SQLite with serialized embeddings for
//! brute-force cosine similarity search. In-process, no external server.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::{IndexedRecord, RetrievalResult, VectorIndex, UPSERT_BATCH_SIZE};
use crate::core::errors::ApiError;

pub struct SqliteVectorIndex {
    pool: SqlitePool,
    dimensions: usize,
}

impl SqliteVectorIndex {
    pub async fn new(db_path: PathBuf, dimensions: usize) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::index)?;

        Ok(Self { pool, dimensions })
    }

    async fn create_tables(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                document_id TEXT NOT NULL DEFAULT '',
                metadata TEXT DEFAULT '{}',
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::index)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::index)?;

        Ok(())
    }

    /// Serialize embedding to bytes (little-endian f32).
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    async fn write_batch(&self, batch: &[IndexedRecord]) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::index)?;

        for record in batch {
            let blob = Self::serialize_embedding(&record.embedding);
            let metadata_str =
                serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".to_string());

            sqlx::query(
                "INSERT OR REPLACE INTO chunks (id, content, document_id, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&record.id)
            .bind(&record.content)
            .bind(&record.document_id)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::index)?;
        }

        tx.commit().await.map_err(ApiError::index)?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn ensure_schema(&self) -> Result<(), ApiError> {
        self.create_tables().await?;

        // Detect an incompatible existing schema without touching it.
        let row = sqlx::query("SELECT LENGTH(embedding) AS len FROM chunks LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::index)?;

        if let Some(row) = row {
            let len: i64 = row.try_get("len").unwrap_or(0);
            let stored_dims = (len as usize) / 4;
            if stored_dims != 0 && stored_dims != self.dimensions {
                return Err(ApiError::IndexUnavailable(format!(
                    "existing index has {}-dimensional embeddings, configured for {}; \
                     run an explicit index reset to migrate",
                    stored_dims, self.dimensions
                )));
            }
        }

        Ok(())
    }

    async fn upsert_batch(&self, records: &[IndexedRecord]) -> Result<(), ApiError> {
        if records.is_empty() {
            return Ok(());
        }

        let total_batches = records.len().div_ceil(UPSERT_BATCH_SIZE);
        for (batch_index, batch) in records.chunks(UPSERT_BATCH_SIZE).enumerate() {
            if let Err(err) = self.write_batch(batch).await {
                // Earlier batches stay committed; partial index state is
                // reported to the caller, never swallowed.
                return Err(ApiError::IndexUnavailable(format!(
                    "batch {} of {} failed ({} batches committed): {}",
                    batch_index, total_batches, batch_index, err
                )));
            }
            tracing::debug!(
                "Upserted batch {}/{} ({} records)",
                batch_index + 1,
                total_batches,
                batch.len()
            );
        }

        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<RetrievalResult>, ApiError> {
        let rows = if let Some(doc_id) = document_id {
            sqlx::query(
                "SELECT content, metadata, embedding FROM chunks WHERE document_id = ?1",
            )
            .bind(doc_id)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::index)?
        } else {
            sqlx::query("SELECT content, metadata, embedding FROM chunks")
                .fetch_all(&self.pool)
                .await
                .map_err(ApiError::index)?
        };

        let mut scored: Vec<RetrievalResult> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(query_embedding, &stored);

                let metadata_str: String = row.get("metadata");
                let metadata = serde_json::from_str(&metadata_str).unwrap_or(Value::Null);

                Some(RetrievalResult {
                    text: row.get("content"),
                    metadata,
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize, ApiError> {
        let result = sqlx::query("DELETE FROM chunks WHERE document_id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::index)?;

        Ok(result.rows_affected() as usize)
    }

    async fn count(&self, document_id: Option<&str>) -> Result<usize, ApiError> {
        let count: i64 = if let Some(doc_id) = document_id {
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = ?1")
                .bind(doc_id)
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::index)?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::index)?
        };

        Ok(count as usize)
    }

    async fn reset(&self) -> Result<(), ApiError> {
        sqlx::query("DROP TABLE IF EXISTS chunks")
            .execute(&self.pool)
            .await
            .map_err(ApiError::index)?;

        self.create_tables().await?;
        tracing::info!("Vector index reset");
        Ok(())
    }
}
