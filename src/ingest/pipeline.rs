//! Upload pipeline: store the raw file, extract text, chunk it, then
//! embed and index in the background while the document record reports
//! `processing`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::config::Settings;
use crate::core::errors::ApiError;
use crate::documents::{DocStatus, DocumentRecord, DocumentStore};
use crate::index::{IndexedRecord, VectorIndex, UPSERT_BATCH_SIZE};
use crate::ingest::{build_chunks, Chunk, Chunker, Extractor};
use crate::llm::provider::ModelProvider;
use crate::storage::ObjectStore;

pub const UNSUPPORTED_FILE_TYPE: &str =
    "Unsupported file type. Only PDF and CSV files are supported";

/// Per-file failure detail in a mixed upload batch.
#[derive(Debug, Clone, Serialize)]
pub struct FailedUpload {
    pub filename: String,
    pub error: String,
}

/// Outcome of a multi-file upload: per-file successes and failures.
#[derive(Debug, Clone, Serialize, Default)]
pub struct UploadOutcome {
    pub uploaded: Vec<DocumentRecord>,
    pub failed: Vec<FailedUpload>,
}

#[derive(Clone)]
pub struct Ingestor {
    storage: Arc<dyn ObjectStore>,
    provider: Arc<dyn ModelProvider>,
    index: Arc<dyn VectorIndex>,
    documents: Arc<DocumentStore>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Ingestor {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        provider: Arc<dyn ModelProvider>,
        index: Arc<dyn VectorIndex>,
        documents: Arc<DocumentStore>,
        settings: &Settings,
    ) -> Self {
        Self {
            storage,
            provider,
            index,
            documents,
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
        }
    }

    /// Ingest a batch of uploaded files. Each file succeeds or fails
    /// independently; one bad file never aborts the batch.
    pub async fn ingest_batch(&self, files: Vec<(String, Vec<u8>)>) -> UploadOutcome {
        let mut outcome = UploadOutcome::default();
        for (filename, bytes) in files {
            match self.ingest_file(&filename, bytes).await {
                Ok(record) => outcome.uploaded.push(record),
                Err(err) => {
                    warn!(filename = %filename, error = %err, "upload failed");
                    outcome.failed.push(FailedUpload {
                        filename,
                        error: err.to_string(),
                    });
                }
            }
        }
        outcome
    }

    /// Ingest one file: validate, store, extract, chunk, persist the
    /// record, then hand indexing off to a background task. Returns the
    /// `processing` record as soon as extraction succeeds.
    pub async fn ingest_file(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<DocumentRecord, ApiError> {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let extractor = Extractor::for_extension(&ext)
            .ok_or_else(|| ApiError::BadRequest(UNSUPPORTED_FILE_TYPE.to_string()))?;

        let storage_key = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        self.storage.save(&bytes, &storage_key).await?;

        let path = self.storage.path_for(&storage_key);
        let (text, metadata) = match extractor.extract(&path, filename).await {
            Ok(extracted) => extracted,
            Err(err) => {
                // Extraction failed; the stored file is useless, remove it.
                let _ = self.storage.delete(&storage_key).await;
                return Err(err);
            }
        };

        let chunker = Chunker::new(self.chunk_size, self.chunk_overlap)?;
        let chunks = build_chunks(chunker.split(&text), &metadata);

        let record = DocumentRecord {
            id: metadata.id.clone(),
            filename: filename.to_string(),
            doc_type: metadata.doc_type.clone(),
            storage_key,
            metadata: serde_json::to_value(&metadata)
                .map_err(|e| ApiError::internal(format!("metadata serialization: {}", e)))?,
            summary: metadata.fallback_summary(),
            summary_generated: false,
            status: DocStatus::Processing,
            error_message: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.documents.insert(&record).await?;

        let ingestor = self.clone();
        let document_id = record.id.clone();
        tokio::spawn(async move {
            ingestor.index_document(&document_id, chunks).await;
        });

        Ok(record)
    }

    /// Embed and upsert a document's chunks, then flip its status to
    /// `ready` or `error`. Public so tests can drive it deterministically
    /// instead of racing the spawned task.
    ///
    /// A DELETE can land while embedding is still in flight; the record
    /// is re-checked around the upsert so a purged document's chunks do
    /// not get written back as unreachable orphans.
    pub async fn index_document(&self, document_id: &str, chunks: Vec<Chunk>) {
        if matches!(self.documents.get(document_id).await, Ok(None)) {
            info!(document_id, "document deleted before indexing started");
            return;
        }

        match self.embed_and_upsert(&chunks).await {
            Ok(()) => {
                match self.documents.get(document_id).await {
                    Ok(None) => {
                        // Deleted mid-flight; the rows we just wrote must
                        // not outlive the record.
                        info!(document_id, "document deleted during indexing, purging chunks");
                        if let Err(err) = self.index.delete_document(document_id).await {
                            error!(document_id, error = %err, "failed to purge orphaned chunks");
                        }
                        return;
                    }
                    Err(err) => {
                        error!(document_id, error = %err, "failed to re-check document after indexing");
                    }
                    Ok(Some(_)) => {}
                }

                info!(document_id, chunks = chunks.len(), "document indexed");
                if let Err(err) = self
                    .documents
                    .set_status(document_id, DocStatus::Ready, None)
                    .await
                {
                    error!(document_id, error = %err, "failed to mark document ready");
                }
            }
            Err(err) => {
                error!(document_id, error = %err, "indexing failed");
                if let Err(status_err) = self
                    .documents
                    .set_status(document_id, DocStatus::Error, Some(err.to_string()))
                    .await
                {
                    error!(document_id, error = %status_err, "failed to mark document errored");
                }
            }
        }
    }

    async fn embed_and_upsert(&self, chunks: &[Chunk]) -> Result<(), ApiError> {
        let mut records = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let inputs: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.provider.embed(&inputs).await?;
            if embeddings.len() != batch.len() {
                return Err(ApiError::provider(format!(
                    "embedding count mismatch: {} inputs, {} vectors",
                    batch.len(),
                    embeddings.len()
                )));
            }
            for (chunk, embedding) in batch.iter().zip(embeddings) {
                records.push(IndexedRecord::from_chunk(chunk, embedding));
            }
        }
        self.index.upsert_batch(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SqliteVectorIndex;
    use crate::llm::testing::StubProvider;
    use crate::storage::LocalObjectStore;
    use tempfile::TempDir;

    async fn test_ingestor() -> (TempDir, Ingestor, Arc<DocumentStore>, Arc<dyn VectorIndex>) {
        let dir = TempDir::new().unwrap();
        let storage: Arc<dyn ObjectStore> =
            Arc::new(LocalObjectStore::new(&dir.path().join("uploads")));
        let provider: Arc<dyn ModelProvider> = Arc::new(StubProvider::new());
        let index = SqliteVectorIndex::new(dir.path().join("index.db"), 6)
            .await
            .unwrap();
        index.ensure_schema().await.unwrap();
        let index: Arc<dyn VectorIndex> = Arc::new(index);
        let documents = Arc::new(
            DocumentStore::new(dir.path().join("store.db")).await.unwrap(),
        );

        let settings = Settings::default();
        let ingestor = Ingestor::new(
            storage,
            provider,
            index.clone(),
            documents.clone(),
            &settings,
        );
        (dir, ingestor, documents, index)
    }

    fn sample_csv() -> Vec<u8> {
        b"name,score\nalpha,1\nbeta,2\n".to_vec()
    }

    #[tokio::test]
    async fn csv_upload_creates_processing_record() {
        let (_dir, ingestor, documents, _index) = test_ingestor().await;

        let record = ingestor.ingest_file("scores.csv", sample_csv()).await.unwrap();
        assert_eq!(record.status, DocStatus::Processing);
        assert_eq!(record.doc_type, "csv");
        assert!(record.summary.contains("CSV file"));
        assert!(documents.get(&record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn indexing_marks_document_ready() {
        let (_dir, ingestor, documents, index) = test_ingestor().await;

        let record = ingestor.ingest_file("scores.csv", sample_csv()).await.unwrap();
        let chunks = build_chunks(
            vec!["alpha row".to_string(), "beta row".to_string()],
            &crate::ingest::DocMetadata::new_csv("scores.csv", 2, vec!["name".into()]),
        );
        // Drive indexing directly rather than racing the spawned task.
        let mut chunks = chunks;
        for chunk in &mut chunks {
            chunk.metadata.document_id = record.id.clone();
        }
        ingestor.index_document(&record.id, chunks).await;

        let record = documents.require(&record.id).await.unwrap();
        assert_eq!(record.status, DocStatus::Ready);
        assert!(index.count(None).await.unwrap() >= 2);
    }

    #[tokio::test]
    async fn late_indexing_does_not_resurrect_deleted_document() {
        let (_dir, ingestor, documents, index) = test_ingestor().await;

        let metadata =
            crate::ingest::DocMetadata::new_csv("scores.csv", 2, vec!["name".into()]);
        let record = DocumentRecord {
            id: metadata.id.clone(),
            filename: "scores.csv".to_string(),
            doc_type: "csv".to_string(),
            storage_key: format!("{}.csv", metadata.id),
            metadata: serde_json::to_value(&metadata).unwrap(),
            summary: metadata.fallback_summary(),
            summary_generated: false,
            status: DocStatus::Processing,
            error_message: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        documents.insert(&record).await.unwrap();
        let chunks = build_chunks(
            vec!["alpha row".to_string(), "beta row".to_string(), "gamma row".to_string()],
            &metadata,
        );

        // The document is deleted while its indexing task is still
        // embedding.
        index.delete_document(&record.id).await.unwrap();
        documents.delete(&record.id).await.unwrap();

        ingestor.index_document(&record.id, chunks).await;
        assert_eq!(index.count(Some(&record.id)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let (_dir, ingestor, _documents, _index) = test_ingestor().await;

        let err = ingestor
            .ingest_file("notes.docx", b"irrelevant".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(err.to_string().contains("Only PDF and CSV"));
    }

    #[tokio::test]
    async fn batch_isolates_per_file_failures() {
        let (_dir, ingestor, _documents, _index) = test_ingestor().await;

        let files = vec![
            ("a.csv".to_string(), sample_csv()),
            ("b.docx".to_string(), b"nope".to_vec()),
            ("c.csv".to_string(), sample_csv()),
            ("d.csv".to_string(), sample_csv()),
        ];
        let outcome = ingestor.ingest_batch(files).await;
        assert_eq!(outcome.uploaded.len(), 3);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].filename, "b.docx");
    }

    #[tokio::test]
    async fn extraction_failure_cleans_up_stored_file() {
        let (dir, ingestor, _documents, _index) = test_ingestor().await;

        let err = ingestor
            .ingest_file("broken.pdf", b"not a pdf at all".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Extraction(_)));

        let uploads = dir.path().join("uploads");
        let leftover = std::fs::read_dir(&uploads)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
    }
}
