//! Conversational question answering over indexed documents.
//!
//! A linear pipeline: validate the question, retrieve similar chunks,
//! assemble a prompt context, run the chat model, then record the turn
//! in conversation memory. Each ask is one model completion.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::core::errors::ApiError;
use crate::index::RetrievalResult;
use crate::llm::provider::ModelProvider;
use crate::qa::context::ContextBuilder;
use crate::qa::memory::ConversationMemory;
use crate::qa::retriever::Retriever;

/// Fixed answer for document-scoped questions when the document has no
/// indexed chunks. No model call is made and memory is not updated.
pub const NO_DOCUMENT_CONTENT_ANSWER: &str =
    "I could not generate an answer because no content was found for this document.";

const QA_PROMPT_TEMPLATE: &str = "You are a helpful AI assistant that answers questions based on provided documents.\n\nUse ONLY the following retrieved context to answer the question. If the context does not contain the answer, simply say you don't know.\n\nConversation so far:\n{chat_history}\n\nQuestion: {question}\n\nContext:\n{context}\n\nAnswer:";

/// A chunk that contributed to an answer, returned for attribution.
#[derive(Debug, Clone, Serialize)]
pub struct SourceDocument {
    pub text: String,
    pub metadata: Value,
}

impl From<&RetrievalResult> for SourceDocument {
    fn from(result: &RetrievalResult) -> Self {
        Self { text: result.text.clone(), metadata: result.metadata.clone() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QaOutcome {
    pub answer: String,
    pub sources: Vec<SourceDocument>,
}

pub struct QaPipeline {
    retriever: Retriever,
    context_builder: ContextBuilder,
    provider: Arc<dyn ModelProvider>,
    top_k: usize,
}

impl QaPipeline {
    pub fn new(
        retriever: Retriever,
        context_builder: ContextBuilder,
        provider: Arc<dyn ModelProvider>,
        top_k: usize,
    ) -> Self {
        Self { retriever, context_builder, provider, top_k }
    }

    /// Answer `question` against the index, optionally scoped to one
    /// document. On success the turn is appended to `memory`; validation
    /// failures and the empty-document short circuit leave memory
    /// untouched.
    pub async fn answer(
        &self,
        question: &str,
        memory: &mut ConversationMemory,
        document_id: Option<&str>,
    ) -> Result<QaOutcome, ApiError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ApiError::BadRequest("Question must not be empty".to_string()));
        }

        let results = self.retriever.retrieve(question, self.top_k, document_id).await?;

        if let Some(doc_id) = document_id {
            if results.is_empty() {
                info!(document_id = doc_id, "no indexed chunks for document");
                return Ok(QaOutcome {
                    answer: NO_DOCUMENT_CONTENT_ANSWER.to_string(),
                    sources: Vec::new(),
                });
            }
        }

        let (context, sources) = match self.context_builder.build(&results) {
            Ok(context) => (context, results),
            Err(err) => {
                // Retrieved chunks were unusable; try again without the
                // document filter before giving up.
                warn!(error = %err, "context assembly failed, retrying unscoped");
                let fresh = self.retriever.retrieve(question, self.top_k, None).await?;
                let context = self.context_builder.build(&fresh)?;
                (context, fresh)
            }
        };

        let prompt = QA_PROMPT_TEMPLATE
            .replace("{chat_history}", &memory.render())
            .replace("{question}", question)
            .replace("{context}", &context);

        let answer = self.provider.complete(&prompt).await?;
        memory.record(question, &answer);

        let sources = sources.iter().map(SourceDocument::from).collect();
        Ok(QaOutcome { answer, sources })
    }
}
