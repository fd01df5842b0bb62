use std::sync::Arc;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::qa::QaOutcome;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClearMemoryRequest {
    pub chat_id: Option<String>,
}

/// `POST /api/qa/ask` — answer a question over the whole index.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = run_ask(&state, &payload, None).await?;
    Ok(Json(json!({
        "answer": outcome.answer,
        "sources": outcome.sources,
    })))
}

/// `POST /api/qa/documents/:document_id/ask` — answer scoped to one
/// document; unknown ids are a 404 before any model work.
pub async fn ask_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.documents.require(&document_id).await?;
    let outcome = run_ask(&state, &payload, Some(record.id.as_str())).await?;
    Ok(Json(json!({
        "answer": outcome.answer,
        "sources": outcome.sources,
        "document_id": record.id,
    })))
}

/// Shared ask flow: resolve the chat transcript into the chat's memory
/// when a `chat_id` is given, run the pipeline, then persist the turn
/// to the transcript.
async fn run_ask(
    state: &Arc<AppState>,
    payload: &AskRequest,
    document_id: Option<&str>,
) -> Result<QaOutcome, ApiError> {
    match payload.chat_id.as_deref() {
        Some(chat_id) => {
            state.chats.require_chat(chat_id).await?;
            let memory = state.memory_for(chat_id).await;
            let mut memory = memory.lock().await;
            if memory.is_empty() {
                memory.inject_history(state.chats.history_text(chat_id).await?);
            }

            let outcome = state.qa.answer(&payload.question, &mut memory, document_id).await?;

            state
                .chats
                .append_message(chat_id, "user", payload.question.trim(), json!([]))
                .await?;
            state
                .chats
                .append_message(
                    chat_id,
                    "assistant",
                    &outcome.answer,
                    serde_json::to_value(&outcome.sources).unwrap_or_else(|_| json!([])),
                )
                .await?;
            Ok(outcome)
        }
        None => {
            let mut memory = crate::qa::ConversationMemory::new();
            state.qa.answer(&payload.question, &mut memory, document_id).await
        }
    }
}

/// `POST /api/qa/memory/clear` — clears one chat's in-process memory,
/// or all of them. Transcripts are untouched.
pub async fn clear_memory(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ClearMemoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.clear_memory(payload.chat_id.as_deref()).await;
    Ok(Json(json!({
        "cleared": true,
        "chat_id": payload.chat_id,
    })))
}
