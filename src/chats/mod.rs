//! Chat transcript store: chats and their ordered messages.
//!
//! Durable conversation history lives here; the in-process
//! [`crate::qa::ConversationMemory`] only accumulates within a session.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use crate::core::errors::ApiError;

const PREVIEW_MAX: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: i64,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
    pub sources: Value,
}

#[derive(Clone)]
pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let conn_str = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn_str)
            .await
            .map_err(|e| ApiError::internal(format!("failed to connect to chat db: {}", e)))?;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                document_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                preview TEXT NOT NULL DEFAULT 'No messages yet',
                deleted INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("failed to init chats table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                sources JSON,
                FOREIGN KEY(chat_id) REFERENCES chats(id) ON DELETE CASCADE
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("failed to init messages table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id)")
            .execute(&pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(Self { pool })
    }

    pub async fn create_chat(
        &self,
        title: Option<String>,
        document_id: Option<String>,
    ) -> Result<ChatInfo, ApiError> {
        let chat_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let title = title.unwrap_or_else(|| "New Chat".to_string());

        sqlx::query(
            "INSERT INTO chats (id, title, document_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chat_id)
        .bind(&title)
        .bind(&document_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(ChatInfo {
            id: chat_id,
            title,
            document_id,
            created_at: now.clone(),
            updated_at: now,
            message_count: 0,
            preview: "No messages yet".to_string(),
        })
    }

    pub async fn get_chat(&self, chat_id: &str) -> Result<Option<ChatInfo>, ApiError> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ? AND deleted = 0")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(row.map(|row| row_to_chat(&row)))
    }

    pub async fn require_chat(&self, chat_id: &str) -> Result<ChatInfo, ApiError> {
        self.get_chat(chat_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("chat {} not found", chat_id)))
    }

    /// Active (non-deleted) chats, newest first, optionally filtered to
    /// chats bound to one document.
    pub async fn list_chats(&self, document_id: Option<&str>) -> Result<Vec<ChatInfo>, ApiError> {
        let rows = if let Some(doc_id) = document_id {
            sqlx::query(
                "SELECT * FROM chats WHERE deleted = 0 AND document_id = ?
                 ORDER BY updated_at DESC",
            )
            .bind(doc_id)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?
        } else {
            sqlx::query("SELECT * FROM chats WHERE deleted = 0 ORDER BY updated_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(ApiError::internal)?
        };

        Ok(rows.iter().map(row_to_chat).collect())
    }

    pub async fn update_title(&self, chat_id: &str, title: &str) -> Result<ChatInfo, ApiError> {
        self.require_chat(chat_id).await?;
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query("UPDATE chats SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(&now)
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        self.require_chat(chat_id).await
    }

    /// Soft delete: the chat stops appearing in listings, messages stay.
    pub async fn delete_chat(&self, chat_id: &str) -> Result<(), ApiError> {
        self.require_chat(chat_id).await?;
        sqlx::query("UPDATE chats SET deleted = 1 WHERE id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }

    pub async fn append_message(
        &self,
        chat_id: &str,
        role: &str,
        content: &str,
        sources: Value,
    ) -> Result<ChatMessage, ApiError> {
        let chat = self.require_chat(chat_id).await?;
        let now = chrono::Utc::now().to_rfc3339();
        let sources_str = serde_json::to_string(&sources).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            "INSERT INTO messages (chat_id, role, content, created_at, sources)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(role)
        .bind(content)
        .bind(&now)
        .bind(&sources_str)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        // Assistant replies drive the listing preview.
        let preview = if role == "assistant" {
            truncate_preview(content)
        } else {
            chat.preview
        };

        sqlx::query(
            "UPDATE chats SET updated_at = ?, message_count = message_count + 1, preview = ?
             WHERE id = ?",
        )
        .bind(&now)
        .bind(&preview)
        .bind(chat_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(ChatMessage {
            id: result.last_insert_rowid(),
            chat_id: chat_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: now,
            sources,
        })
    }

    pub async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        self.require_chat(chat_id).await?;

        let rows = sqlx::query("SELECT * FROM messages WHERE chat_id = ? ORDER BY id ASC")
            .bind(chat_id)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| {
                let sources_str: String = row.try_get("sources").unwrap_or_default();
                ChatMessage {
                    id: row.try_get("id").unwrap_or_default(),
                    chat_id: row.try_get("chat_id").unwrap_or_default(),
                    role: row.try_get("role").unwrap_or_default(),
                    content: row.try_get("content").unwrap_or_default(),
                    created_at: row.try_get("created_at").unwrap_or_default(),
                    sources: serde_json::from_str(&sources_str)
                        .unwrap_or(Value::Array(Vec::new())),
                }
            })
            .collect())
    }

    pub async fn clear_messages(&self, chat_id: &str) -> Result<(), ApiError> {
        self.require_chat(chat_id).await?;

        sqlx::query("DELETE FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query(
            "UPDATE chats SET updated_at = ?, message_count = 0, preview = 'No messages yet'
             WHERE id = ?",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(chat_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Render a chat's transcript as history text for prompt injection.
    /// Unknown chats render as empty history rather than failing the ask.
    pub async fn history_text(&self, chat_id: &str) -> Result<String, ApiError> {
        if self.get_chat(chat_id).await?.is_none() {
            return Ok(String::new());
        }

        let messages = self.list_messages(chat_id).await?;
        let mut history = String::new();
        for message in messages {
            let speaker = match message.role.as_str() {
                "assistant" => "Assistant",
                _ => "User",
            };
            history.push_str(&format!("{}: {}\n", speaker, message.content));
        }
        Ok(history.trim_end().to_string())
    }
}

fn truncate_preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_MAX {
        let cut: String = content.chars().take(PREVIEW_MAX - 3).collect();
        format!("{}...", cut)
    } else {
        content.to_string()
    }
}

fn row_to_chat(row: &sqlx::sqlite::SqliteRow) -> ChatInfo {
    ChatInfo {
        id: row.try_get("id").unwrap_or_default(),
        title: row.try_get("title").unwrap_or_default(),
        document_id: row.try_get("document_id").unwrap_or(None),
        created_at: row.try_get("created_at").unwrap_or_default(),
        updated_at: row.try_get("updated_at").unwrap_or_default(),
        message_count: row.try_get("message_count").unwrap_or(0),
        preview: row.try_get("preview").unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> (tempfile::TempDir, ChatStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = ChatStore::new(tmp.path().join("chats.db")).await.unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn create_append_and_list() {
        let (_tmp, store) = test_store().await;
        let chat = store.create_chat(Some("My chat".to_string()), None).await.unwrap();

        store
            .append_message(&chat.id, "user", "What is Rust?", json!([]))
            .await
            .unwrap();
        store
            .append_message(&chat.id, "assistant", "A systems language.", json!([{"text": "..."}]))
            .await
            .unwrap();

        let messages = store.list_messages(&chat.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");

        let info = store.require_chat(&chat.id).await.unwrap();
        assert_eq!(info.message_count, 2);
        assert_eq!(info.preview, "A systems language.");
    }

    #[tokio::test]
    async fn preview_only_follows_assistant_messages() {
        let (_tmp, store) = test_store().await;
        let chat = store.create_chat(None, None).await.unwrap();

        store
            .append_message(&chat.id, "user", "hello there", json!([]))
            .await
            .unwrap();
        let info = store.require_chat(&chat.id).await.unwrap();
        assert_eq!(info.preview, "No messages yet");

        let long = "x".repeat(150);
        store
            .append_message(&chat.id, "assistant", &long, json!([]))
            .await
            .unwrap();
        let info = store.require_chat(&chat.id).await.unwrap();
        assert_eq!(info.preview.chars().count(), 100);
        assert!(info.preview.ends_with("..."));
    }

    #[tokio::test]
    async fn soft_delete_hides_chat() {
        let (_tmp, store) = test_store().await;
        let chat = store.create_chat(None, None).await.unwrap();
        store.delete_chat(&chat.id).await.unwrap();

        assert!(store.get_chat(&chat.id).await.unwrap().is_none());
        assert!(store.list_chats(None).await.unwrap().is_empty());
        assert!(matches!(
            store.delete_chat(&chat.id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn document_filter_on_listing() {
        let (_tmp, store) = test_store().await;
        store.create_chat(None, Some("doc-a".to_string())).await.unwrap();
        store.create_chat(None, Some("doc-b".to_string())).await.unwrap();
        store.create_chat(None, None).await.unwrap();

        assert_eq!(store.list_chats(Some("doc-a")).await.unwrap().len(), 1);
        assert_eq!(store.list_chats(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn history_text_renders_turns_in_order() {
        let (_tmp, store) = test_store().await;
        let chat = store.create_chat(None, None).await.unwrap();
        store.append_message(&chat.id, "user", "Q1", json!([])).await.unwrap();
        store.append_message(&chat.id, "assistant", "A1", json!([])).await.unwrap();

        let history = store.history_text(&chat.id).await.unwrap();
        assert_eq!(history, "User: Q1\nAssistant: A1");

        // Unknown chats are empty history, not an error.
        assert_eq!(store.history_text("missing").await.unwrap(), "");
    }

    #[tokio::test]
    async fn clear_messages_resets_counters() {
        let (_tmp, store) = test_store().await;
        let chat = store.create_chat(None, None).await.unwrap();
        store.append_message(&chat.id, "user", "Q", json!([])).await.unwrap();
        store.clear_messages(&chat.id).await.unwrap();

        assert!(store.list_messages(&chat.id).await.unwrap().is_empty());
        let info = store.require_chat(&chat.id).await.unwrap();
        assert_eq!(info.message_count, 0);
        assert_eq!(info.preview, "No messages yet");
    }
}
