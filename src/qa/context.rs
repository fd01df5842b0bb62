//! Prompt-context assembly from retrieved chunks.

use crate::core::errors::ApiError;
use crate::index::RetrievalResult;

/// Returned when retrieval produced nothing usable. A valid context — it
/// tells the model to answer honestly that no information was found, and
/// must not be treated as a failure by callers.
pub const NO_RESULTS_SENTINEL: &str = "No relevant documents found.";

/// Renders the top-N highest-scoring results into one bounded context
/// string with source attribution.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    top_n: usize,
}

impl ContextBuilder {
    pub fn new(top_n: usize) -> Self {
        Self { top_n: top_n.max(1) }
    }

    /// Build the context string. Results are assumed to already be in
    /// descending score order (the retriever guarantees this).
    ///
    /// Fails only if every candidate chunk is blank — callers fall back
    /// to a fresh retrieval in that case.
    pub fn build(&self, results: &[RetrievalResult]) -> Result<String, ApiError> {
        if results.is_empty() {
            return Ok(NO_RESULTS_SENTINEL.to_string());
        }

        let blocks: Vec<String> = results
            .iter()
            .take(self.top_n)
            .filter(|result| !result.text.trim().is_empty())
            .map(|result| format!("Document: {}\nContent: {}", result.source(), result.text))
            .collect();

        if blocks.is_empty() {
            return Err(ApiError::Internal(
                "retrieved chunks contained no usable text".to_string(),
            ));
        }

        Ok(blocks.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(source: &str, text: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            text: text.to_string(),
            metadata: json!({"source": source}),
            score,
        }
    }

    #[test]
    fn renders_top_n_with_attribution() {
        let builder = ContextBuilder::new(2);
        let results = vec![
            result("a.pdf", "first chunk", 0.9),
            result("b.csv", "second chunk", 0.8),
            result("c.pdf", "third chunk", 0.7),
        ];

        let context = builder.build(&results).unwrap();
        assert_eq!(
            context,
            "Document: a.pdf\nContent: first chunk\n\nDocument: b.csv\nContent: second chunk"
        );
    }

    #[test]
    fn empty_results_return_sentinel() {
        let builder = ContextBuilder::new(3);
        assert_eq!(builder.build(&[]).unwrap(), NO_RESULTS_SENTINEL);
    }

    #[test]
    fn all_blank_chunks_is_an_internal_failure() {
        let builder = ContextBuilder::new(3);
        let results = vec![result("a.pdf", "   ", 0.9)];
        assert!(builder.build(&results).is_err());
    }

    #[test]
    fn missing_source_metadata_renders_unknown() {
        let builder = ContextBuilder::new(1);
        let results = vec![RetrievalResult {
            text: "text".to_string(),
            metadata: json!({}),
            score: 1.0,
        }];
        let context = builder.build(&results).unwrap();
        assert!(context.starts_with("Document: unknown\n"));
    }
}
