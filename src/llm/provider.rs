use async_trait::async_trait;

use crate::core::errors::ApiError;

/// Capability boundary to the embedding/completion model vendor.
///
/// Every call must complete within a bounded timeout (implementations
/// configure their HTTP client accordingly). No retries happen here;
/// retry policy is a caller concern.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// one-shot text completion for an assembled prompt
    async fn complete(&self, prompt: &str) -> Result<String, ApiError>;

    /// embeddings for a batch of texts, one vector per input, same order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}
