//! Query-time retrieval: embed the question, then search the index.

use std::sync::Arc;

use tracing::debug;

use crate::core::errors::ApiError;
use crate::index::{RetrievalResult, VectorIndex};
use crate::llm::provider::ModelProvider;

/// Stateless retrieval over the vector index. Every call embeds the query
/// fresh — no query or embedding cache.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    provider: Arc<dyn ModelProvider>,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, provider: Arc<dyn ModelProvider>) -> Self {
        Self { index, provider }
    }

    /// Embed `query` and return the `top_k` most similar chunks, optionally
    /// restricted to one document.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<RetrievalResult>, ApiError> {
        let embeddings = self.provider.embed(&[query.to_string()]).await?;
        let query_embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::provider("embedding response was empty"))?;

        let results = self.index.search(&query_embedding, top_k, document_id).await?;
        debug!(
            top_k,
            document_id = document_id.unwrap_or("<all>"),
            hits = results.len(),
            "retrieval complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexedRecord, SqliteVectorIndex};
    use crate::llm::testing::StubProvider;
    use serde_json::json;
    use tempfile::TempDir;

    async fn seeded_index() -> (TempDir, Arc<SqliteVectorIndex>) {
        let dir = TempDir::new().unwrap();
        let index = SqliteVectorIndex::new(dir.path().join("index.db"), 6)
            .await
            .unwrap();
        index.ensure_schema().await.unwrap();

        let texts = [
            ("doc-1", "the ocean is deep and blue"),
            ("doc-1", "rust programs manage memory safely"),
            ("doc-2", "the sky above the mountain"),
        ];
        let records: Vec<IndexedRecord> = texts
            .iter()
            .enumerate()
            .map(|(i, (doc, text))| IndexedRecord {
                id: format!("{doc}_chunk_{i}"),
                content: text.to_string(),
                embedding: StubProvider::embed_text(text),
                document_id: doc.to_string(),
                metadata: json!({"source": format!("{doc}.pdf")}),
            })
            .collect();
        index.upsert_batch(&records).await.unwrap();
        (dir, Arc::new(index))
    }

    #[tokio::test]
    async fn retrieves_most_similar_chunk_first() {
        let provider = Arc::new(StubProvider::new());
        let (_dir, index) = seeded_index().await;
        let retriever = Retriever::new(index, provider);

        let results = retriever.retrieve("ocean waves", 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].text.contains("ocean"));
    }

    #[tokio::test]
    async fn document_filter_restricts_results() {
        let provider = Arc::new(StubProvider::new());
        let (_dir, index) = seeded_index().await;
        let retriever = Retriever::new(index, provider);

        let results = retriever
            .retrieve("ocean waves", 5, Some("doc-2"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].text.contains("sky"));
    }
}
