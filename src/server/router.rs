use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chats, documents, health, qa};
use crate::state::AppState;

/// 50 MiB multipart ceiling for document uploads.
const UPLOAD_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Creates the main application router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health::banner))
        .route("/health", get(health::health))
        .route("/api/documents/upload", post(documents::upload))
        .route("/api/documents", get(documents::list))
        .route(
            "/api/documents/:document_id",
            get(documents::get).delete(documents::delete),
        )
        .route("/api/documents/:document_id/status", get(documents::status))
        .route("/api/documents/:document_id/summary", get(documents::summary))
        .route("/api/qa/ask", post(qa::ask))
        .route("/api/qa/documents/:document_id/ask", post(qa::ask_document))
        .route("/api/qa/memory/clear", post(qa::clear_memory))
        .route("/api/chats", get(chats::list).post(chats::create))
        .route(
            "/api/chats/:chat_id",
            get(chats::get).put(chats::update_title).delete(chats::delete),
        )
        .route(
            "/api/chats/:chat_id/messages",
            get(chats::list_messages)
                .post(chats::append_message)
                .delete(chats::clear_messages),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}
