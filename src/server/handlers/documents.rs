use std::sync::Arc;
use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::{info, warn};

use crate::core::errors::ApiError;
use crate::ingest::extractor::DocMetadata;
use crate::state::AppState;

/// `POST /api/documents/upload` — multipart batch upload. Files succeed
/// or fail independently; the response lists both. A batch with no
/// successes at all is a 400.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart payload: {}", e)))?
    {
        let filename = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {}", e)))?;
        files.push((filename, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files provided".to_string()));
    }

    let outcome = state.ingestor.ingest_batch(files).await;
    if outcome.uploaded.is_empty() {
        let reasons: Vec<String> = outcome
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.filename, f.error))
            .collect();
        return Err(ApiError::BadRequest(format!(
            "All uploads failed: {}",
            reasons.join("; ")
        )));
    }

    Ok(Json(json!({
        "documents": outcome.uploaded,
        "failed_uploads": outcome.failed,
    })))
}

pub async fn list(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let documents = state.documents.list().await?;
    Ok(Json(json!({"documents": documents})))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.documents.require(&document_id).await?;
    Ok(Json(json!({"document": record})))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.documents.require(&document_id).await?;
    Ok(Json(json!({
        "document_id": record.id,
        "status": record.status,
        "error_message": record.error_message,
    })))
}

/// `GET /api/documents/:id/summary` — returns the cached model summary,
/// generating and caching it on first request. A generation failure
/// yields the metadata fallback text without caching, so a later
/// request can try again.
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.documents.require(&document_id).await?;
    if record.summary_generated {
        return Ok(Json(json!({
            "document_id": record.id,
            "summary": record.summary,
        })));
    }

    let metadata: DocMetadata = serde_json::from_value(record.metadata.clone())
        .map_err(|e| ApiError::internal(format!("stored document metadata invalid: {}", e)))?;

    // Pull the whole document back out of the index, in chunk order.
    let mut results = state
        .retriever
        .retrieve(&record.filename, state.settings.summary_fetch_k, Some(&record.id))
        .await?;
    results.sort_by_key(|r| {
        r.metadata
            .get("chunk_index")
            .and_then(|v| v.as_u64())
            .unwrap_or(u64::MAX)
    });
    let texts: Vec<String> = results.into_iter().map(|r| r.text).collect();

    let summary = state.summarizer.summarize_document(&texts, &metadata).await?;
    if summary.generated {
        state.documents.set_summary(&record.id, &summary.text).await?;
        info!(document_id = %record.id, "document summary cached");
    }

    Ok(Json(json!({
        "document_id": record.id,
        "summary": summary.text,
    })))
}

/// `DELETE /api/documents/:id` — removes the stored file, every index
/// row, and the record itself.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.documents.require(&document_id).await?;

    let chunks_removed = state.index.delete_document(&record.id).await?;
    if let Err(err) = state.storage.delete(&record.storage_key).await {
        warn!(document_id = %record.id, error = %err, "failed to remove stored file");
    }
    state.documents.delete(&record.id).await?;
    info!(document_id = %record.id, chunks_removed, "document deleted");

    Ok(Json(json!({
        "deleted": true,
        "document_id": record.id,
        "chunks_removed": chunks_removed,
    })))
}
