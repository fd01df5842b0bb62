use std::sync::Arc;
use std::collections::HashMap;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub title: Option<String>,
    pub document_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChatRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct AppendMessageRequest {
    pub role: String,
    pub content: String,
    pub sources: Option<Value>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(document_id) = payload.document_id.as_deref() {
        state.documents.require(document_id).await?;
    }
    let chat = state.chats.create_chat(payload.title, payload.document_id).await?;
    Ok(Json(json!({"chat": chat})))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let chats = state
        .chats
        .list_chats(params.get("document_id").map(String::as_str))
        .await?;
    Ok(Json(json!({"chats": chats})))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let chat = state.chats.require_chat(&chat_id).await?;
    let messages = state.chats.list_messages(&chat_id).await?;
    Ok(Json(json!({"chat": chat, "messages": messages})))
}

pub async fn update_title(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
    Json(payload): Json<UpdateChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title must not be empty".to_string()));
    }
    let chat = state.chats.update_title(&chat_id, payload.title.trim()).await?;
    Ok(Json(json!({"chat": chat})))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.chats.require_chat(&chat_id).await?;
    state.chats.delete_chat(&chat_id).await?;
    state.clear_memory(Some(&chat_id)).await;
    Ok(Json(json!({"deleted": true, "chat_id": chat_id})))
}

pub async fn append_message(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
    Json(payload): Json<AppendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !matches!(payload.role.as_str(), "user" | "assistant") {
        return Err(ApiError::BadRequest(
            "Role must be 'user' or 'assistant'".to_string(),
        ));
    }
    let message = state
        .chats
        .append_message(
            &chat_id,
            &payload.role,
            &payload.content,
            payload.sources.unwrap_or_else(|| json!([])),
        )
        .await?;
    Ok(Json(json!({"message": message})))
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.chats.require_chat(&chat_id).await?;
    let messages = state.chats.list_messages(&chat_id).await?;
    Ok(Json(json!({"messages": messages})))
}

pub async fn clear_messages(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.chats.require_chat(&chat_id).await?;
    state.chats.clear_messages(&chat_id).await?;
    state.clear_memory(Some(&chat_id)).await;
    Ok(Json(json!({"cleared": true, "chat_id": chat_id})))
}
