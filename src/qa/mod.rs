//! The retrieval-augmented answer pipeline.

pub mod context;
pub mod memory;
pub mod pipeline;
pub mod retriever;
pub mod summarizer;

pub use context::ContextBuilder;
pub use memory::ConversationMemory;
pub use pipeline::{QaOutcome, QaPipeline, SourceDocument};
pub use retriever::Retriever;
pub use summarizer::{DocumentSummary, MapReduceSummarizer};
