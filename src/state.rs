//! Shared application state wired at startup and handed to the router.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::core::config::{AppPaths, Settings};
use crate::core::errors::ApiError;
use crate::documents::DocumentStore;
use crate::index::{SqliteVectorIndex, VectorIndex};
use crate::ingest::pipeline::Ingestor;
use crate::llm::provider::ModelProvider;
use crate::llm::OpenAiProvider;
use crate::qa::{ContextBuilder, ConversationMemory, MapReduceSummarizer, QaPipeline, Retriever};
use crate::storage::{LocalObjectStore, ObjectStore};

/// Per-chat conversation memories. Created lazily on first use; an entry
/// lives until cleared or the process exits.
type MemoryRegistry = Mutex<HashMap<String, Arc<Mutex<ConversationMemory>>>>;

pub struct AppState {
    pub settings: Settings,
    pub provider: Arc<dyn ModelProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub storage: Arc<dyn ObjectStore>,
    pub documents: Arc<DocumentStore>,
    pub chats: Arc<crate::chats::ChatStore>,
    pub ingestor: Ingestor,
    pub qa: QaPipeline,
    pub summarizer: MapReduceSummarizer,
    pub retriever: Retriever,
    memories: MemoryRegistry,
}

impl AppState {
    /// Wire every component from paths + settings. Schema provisioning is
    /// idempotent and never destructive.
    pub async fn initialize(paths: &AppPaths, settings: Settings) -> Result<Arc<Self>, ApiError> {
        let provider: Arc<dyn ModelProvider> = Arc::new(OpenAiProvider::new(&settings)?);
        Self::wire(paths, settings, provider).await
    }

    /// Wiring shared between startup and tests, which substitute their
    /// own provider.
    pub(crate) async fn wire(
        paths: &AppPaths,
        settings: Settings,
        provider: Arc<dyn ModelProvider>,
    ) -> Result<Arc<Self>, ApiError> {
        info!(provider = provider.name(), "model provider configured");

        let index: Arc<dyn VectorIndex> = Arc::new(
            SqliteVectorIndex::new(paths.index_db_path.clone(), settings.embedding_dimensions)
                .await?,
        );
        index.ensure_schema().await?;

        let storage: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(&paths.upload_dir));
        let documents = Arc::new(DocumentStore::new(paths.store_db_path.clone()).await?);
        let chats = Arc::new(crate::chats::ChatStore::new(paths.store_db_path.clone()).await?);

        let ingestor = Ingestor::new(
            storage.clone(),
            provider.clone(),
            index.clone(),
            documents.clone(),
            &settings,
        );

        let retriever = Retriever::new(index.clone(), provider.clone());
        let qa = QaPipeline::new(
            retriever.clone(),
            ContextBuilder::new(settings.context_top_n),
            provider.clone(),
            settings.retrieval_top_k,
        );
        let summarizer = MapReduceSummarizer::new(
            provider.clone(),
            settings.summary_token_max,
            settings.summary_max_collapse_rounds,
            settings.summary_map_concurrency,
        );

        Ok(Arc::new(Self {
            settings,
            provider,
            index,
            storage,
            documents,
            chats,
            ingestor,
            qa,
            summarizer,
            retriever,
            memories: Mutex::new(HashMap::new()),
        }))
    }

    /// Fetch (or create) the conversation memory for a chat id.
    pub async fn memory_for(&self, chat_id: &str) -> Arc<Mutex<ConversationMemory>> {
        let mut registry = self.memories.lock().await;
        registry
            .entry(chat_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationMemory::new())))
            .clone()
    }

    /// Clear one chat's memory, or every memory when no id is given.
    pub async fn clear_memory(&self, chat_id: Option<&str>) {
        let mut registry = self.memories.lock().await;
        match chat_id {
            Some(id) => {
                registry.remove(id);
            }
            None => registry.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_for_memories() -> MemoryRegistry {
        Mutex::new(HashMap::new())
    }

    #[tokio::test]
    async fn memories_are_isolated_per_chat() {
        let registry = state_for_memories();
        {
            let mut map = registry.lock().await;
            map.insert(
                "chat-a".to_string(),
                Arc::new(Mutex::new(ConversationMemory::new())),
            );
        }

        let map = registry.lock().await;
        let a = map.get("chat-a").unwrap();
        a.lock().await.record("q", "a");
        assert!(!a.lock().await.is_empty());
        assert!(!map.contains_key("chat-b"));
    }
}
