use std::sync::Arc;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn banner() -> impl IntoResponse {
    Json(json!({
        "service": "document-qa-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let indexed_chunks = state.index.count(None).await.unwrap_or(0);
    Ok(Json(json!({
        "status": "ok",
        "indexed_chunks": indexed_chunks
    })))
}
