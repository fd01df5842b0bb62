pub mod openai;
pub mod provider;

pub use openai::OpenAiProvider;
pub use provider::ModelProvider;

#[cfg(test)]
pub mod testing {
    //! Deterministic stub provider for pipeline tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::ModelProvider;
    use crate::core::errors::ApiError;

    /// Echo-style provider: completions are derived from the prompt,
    /// embeddings are keyword-hash vectors so identical texts collide.
    pub struct StubProvider {
        pub completions: AtomicUsize,
        pub embeddings: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
        pub fail_completions: bool,
    }

    impl StubProvider {
        pub fn new() -> Self {
            Self {
                completions: AtomicUsize::new(0),
                embeddings: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                fail_completions: false,
            }
        }

        pub fn failing() -> Self {
            Self { fail_completions: true, ..Self::new() }
        }

        pub fn completion_count(&self) -> usize {
            self.completions.load(Ordering::SeqCst)
        }

        /// Token-overlap embedding: one slot per known keyword, plus a
        /// bias slot so no vector is all-zero.
        pub fn embed_text(text: &str) -> Vec<f32> {
            let lower = text.to_lowercase();
            let keywords = ["rust", "ocean", "sky", "mountain", "database"];
            let mut vector: Vec<f32> = keywords
                .iter()
                .map(|kw| if lower.contains(kw) { 1.0 } else { 0.0 })
                .collect();
            vector.push(0.1);
            vector
        }
    }

    #[async_trait]
    impl ModelProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
            if self.fail_completions {
                return Err(ApiError::ModelProvider("stub completion failure".to_string()));
            }
            self.completions.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(format!("summary[{}]", prompt.len()))
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            self.embeddings.fetch_add(1, Ordering::SeqCst);
            Ok(inputs.iter().map(|t| Self::embed_text(t)).collect())
        }
    }
}
