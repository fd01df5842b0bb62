//! Map-reduce document summarization.
//!
//! Each chunk is summarized independently (map), partial summaries are
//! collapsed in groups while their combined size exceeds the token
//! budget, then a final combine pass produces the document summary.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::core::errors::ApiError;
use crate::ingest::extractor::DocMetadata;
use crate::llm::provider::ModelProvider;

const MAP_PROMPT_TEMPLATE: &str = "Write a concise summary of the following text:\n\n{text}\n\nCONCISE SUMMARY:";

const COMBINE_PROMPT_TEMPLATE: &str = "The following are partial summaries of sections of a document:\n\n{text}\n\nCombine them into a single, comprehensive summary of the whole document. Include the main topics, key findings, and important details.\n\nCOMPREHENSIVE SUMMARY:";

const GENERATION_FAILED_NOTE: &str = "A detailed summary could not be generated.";

/// Crude token estimate; good enough to decide when partial summaries
/// still need collapsing.
fn estimate_tokens(text: &str) -> usize {
    (text.split_whitespace().count() as f64 * 1.3) as usize
}

pub struct MapReduceSummarizer {
    provider: Arc<dyn ModelProvider>,
    token_max: usize,
    max_collapse_rounds: usize,
    map_concurrency: usize,
}

impl MapReduceSummarizer {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        token_max: usize,
        max_collapse_rounds: usize,
        map_concurrency: usize,
    ) -> Self {
        Self {
            provider,
            token_max,
            max_collapse_rounds,
            map_concurrency: map_concurrency.max(1),
        }
    }

    /// Summarize a list of chunk texts. Fails fast on empty input.
    pub async fn summarize(&self, texts: &[String]) -> Result<String, ApiError> {
        if texts.is_empty() {
            return Err(ApiError::BadRequest(
                "Nothing to summarize: document has no extracted text".to_string(),
            ));
        }

        // Map phase: summarize each chunk, bounded concurrency, order
        // preserved. Prompts are built up front so each future owns its
        // own string.
        let prompts: Vec<String> = texts
            .iter()
            .map(|text| MAP_PROMPT_TEMPLATE.replace("{text}", text))
            .collect();
        let mut partials: Vec<String> = stream::iter(
            prompts
                .into_iter()
                .map(|prompt| async move { self.provider.complete(&prompt).await }),
        )
        .buffered(self.map_concurrency)
        .collect::<Vec<Result<String, ApiError>>>()
        .await
        .into_iter()
        .collect::<Result<Vec<String>, ApiError>>()?;

        // Collapse phase: while the partials together exceed the token
        // budget, reduce them group by group. Bounded rounds so a
        // non-shrinking model output cannot loop forever.
        let mut rounds = 0;
        while partials.len() > 1
            && estimate_tokens(&partials.join("\n\n")) > self.token_max
            && rounds < self.max_collapse_rounds
        {
            rounds += 1;
            let groups = partition_by_budget(&partials, self.token_max);
            let mut collapsed = Vec::with_capacity(groups.len());
            for group in groups {
                let prompt = COMBINE_PROMPT_TEMPLATE.replace("{text}", &group.join("\n\n"));
                collapsed.push(self.provider.complete(&prompt).await?);
            }
            partials = collapsed;
        }
        if rounds == self.max_collapse_rounds {
            warn!(rounds, "summary collapse hit round ceiling");
        }

        let prompt = COMBINE_PROMPT_TEMPLATE.replace("{text}", &partials.join("\n\n"));
        let summary = self.provider.complete(&prompt).await?;
        info!(chunks = texts.len(), rounds, "summary generated");
        Ok(summary)
    }

    /// Summarize a document's chunks and append its metadata footer. On
    /// generation failure returns the metadata-derived fallback text
    /// instead of an error, so the caller always has something to show;
    /// `generated` tells callers whether the text is worth caching.
    pub async fn summarize_document(
        &self,
        texts: &[String],
        metadata: &DocMetadata,
    ) -> Result<DocumentSummary, ApiError> {
        if texts.is_empty() {
            return Err(ApiError::BadRequest(
                "Nothing to summarize: document has no extracted text".to_string(),
            ));
        }

        match self.summarize(texts).await {
            Ok(summary) => Ok(DocumentSummary {
                text: format!("{}{}", summary, metadata.summary_footer()),
                generated: true,
            }),
            Err(err) => {
                warn!(error = %err, document_id = %metadata.id, "summary generation failed");
                Ok(DocumentSummary {
                    text: format!(
                        "{}\n\n{}{}",
                        metadata.fallback_summary(),
                        GENERATION_FAILED_NOTE,
                        metadata.summary_footer()
                    ),
                    generated: false,
                })
            }
        }
    }
}

/// Outcome of [`MapReduceSummarizer::summarize_document`].
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub text: String,
    pub generated: bool,
}

/// Greedy partition: pack consecutive texts into groups whose cumulative
/// token estimate stays under `budget`. Every group holds at least one
/// element, so partitioning always makes progress.
fn partition_by_budget(texts: &[String], budget: usize) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0;

    for text in texts {
        let tokens = estimate_tokens(text);
        if !current.is_empty() && current_tokens + tokens > budget {
            groups.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current_tokens += tokens;
        current.push(text.clone());
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}
