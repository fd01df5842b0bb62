//! Persisted document metadata: one record per successful extraction,
//! carrying the cached summary and the asynchronous indexing status.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use crate::core::errors::ApiError;

/// Post-upload indexing status. Starts `processing`, transitions to
/// `ready` once the background index upload completes, or `error` with a
/// captured message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    Processing,
    Ready,
    Error,
}

impl DocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::Processing => "processing",
            DocStatus::Ready => "ready",
            DocStatus::Error => "error",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "ready" => DocStatus::Ready,
            "error" => DocStatus::Error,
            _ => DocStatus::Processing,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub doc_type: String,
    /// Key of the stored upload in the object store.
    pub storage_key: String,
    pub metadata: Value,
    pub summary: String,
    /// False while `summary` still holds the metadata-derived fallback
    /// written at upload; true once a model-generated summary is cached.
    pub summary_generated: bool,
    pub status: DocStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let conn_str = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn_str)
            .await
            .map_err(|e| ApiError::internal(format!("failed to connect to document db: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                doc_type TEXT NOT NULL,
                storage_key TEXT NOT NULL,
                metadata JSON,
                summary TEXT NOT NULL DEFAULT '',
                summary_generated INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'processing',
                error_message TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("failed to init documents table: {}", e)))?;

        Ok(Self { pool })
    }

    pub async fn insert(&self, record: &DocumentRecord) -> Result<(), ApiError> {
        let metadata_str =
            serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".to_string());

        sqlx::query(
            "INSERT INTO documents
                (id, filename, doc_type, storage_key, metadata, summary, summary_generated,
                 status, error_message, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.filename)
        .bind(&record.doc_type)
        .bind(&record.storage_key)
        .bind(&metadata_str)
        .bind(&record.summary)
        .bind(record.summary_generated as i64)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(&record.created_at)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    pub async fn get(&self, document_id: &str) -> Result<Option<DocumentRecord>, ApiError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(row.map(|row| row_to_record(&row)))
    }

    /// Like [`DocumentStore::get`] but unknown ids are a `NotFound` error.
    pub async fn require(&self, document_id: &str) -> Result<DocumentRecord, ApiError> {
        self.get(document_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("document {} not found", document_id)))
    }

    pub async fn list(&self) -> Result<Vec<DocumentRecord>, ApiError> {
        let rows = sqlx::query("SELECT * FROM documents ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    pub async fn set_status(
        &self,
        document_id: &str,
        status: DocStatus,
        error_message: Option<String>,
    ) -> Result<(), ApiError> {
        sqlx::query("UPDATE documents SET status = ?, error_message = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&error_message)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Cache a model-generated summary, replacing the upload-time
    /// fallback and marking the document summarized.
    pub async fn set_summary(&self, document_id: &str, summary: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE documents SET summary = ?, summary_generated = 1 WHERE id = ?")
            .bind(summary)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    pub async fn delete(&self, document_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> DocumentRecord {
    let metadata_str: String = row.try_get("metadata").unwrap_or_default();
    let status_str: String = row.try_get("status").unwrap_or_default();

    DocumentRecord {
        id: row.try_get("id").unwrap_or_default(),
        filename: row.try_get("filename").unwrap_or_default(),
        doc_type: row.try_get("doc_type").unwrap_or_default(),
        storage_key: row.try_get("storage_key").unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_str).unwrap_or(Value::Null),
        summary: row.try_get("summary").unwrap_or_default(),
        summary_generated: row.try_get::<i64, _>("summary_generated").unwrap_or(0) != 0,
        status: DocStatus::parse(&status_str),
        error_message: row.try_get("error_message").unwrap_or(None),
        created_at: row.try_get("created_at").unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> (tempfile::TempDir, DocumentStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(tmp.path().join("docs.db")).await.unwrap();
        (tmp, store)
    }

    fn sample(id: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            filename: "report.pdf".to_string(),
            doc_type: "pdf".to_string(),
            storage_key: format!("{}.pdf", id),
            metadata: json!({"pages": 3}),
            summary: "This is a 3-page PDF document.".to_string(),
            summary_generated: false,
            status: DocStatus::Processing,
            error_message: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn insert_get_delete() {
        let (_tmp, store) = test_store().await;
        store.insert(&sample("d1")).await.unwrap();

        let record = store.require("d1").await.unwrap();
        assert_eq!(record.filename, "report.pdf");
        assert_eq!(record.status, DocStatus::Processing);
        assert_eq!(record.metadata["pages"], 3);

        assert!(store.delete("d1").await.unwrap());
        assert!(matches!(store.require("d1").await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn status_transitions_are_persisted() {
        let (_tmp, store) = test_store().await;
        store.insert(&sample("d1")).await.unwrap();

        store.set_status("d1", DocStatus::Ready, None).await.unwrap();
        assert_eq!(store.require("d1").await.unwrap().status, DocStatus::Ready);

        store
            .set_status("d1", DocStatus::Error, Some("index write failed".to_string()))
            .await
            .unwrap();
        let record = store.require("d1").await.unwrap();
        assert_eq!(record.status, DocStatus::Error);
        assert_eq!(record.error_message.as_deref(), Some("index write failed"));
    }

    #[tokio::test]
    async fn summary_is_cached() {
        let (_tmp, store) = test_store().await;
        store.insert(&sample("d1")).await.unwrap();
        assert!(!store.require("d1").await.unwrap().summary_generated);

        store.set_summary("d1", "generated summary").await.unwrap();
        let record = store.require("d1").await.unwrap();
        assert_eq!(record.summary, "generated summary");
        assert!(record.summary_generated);
    }
}
