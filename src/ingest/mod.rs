//! Document ingestion: extraction, chunking, and the upload pipeline.

pub mod chunker;
pub mod extractor;
pub mod pipeline;

use serde::{Deserialize, Serialize};

pub use chunker::Chunker;
pub use extractor::{DocMetadata, Extractor};

/// A bounded slice of a document's extracted text, the unit of embedding
/// and retrieval. Immutable once created; purged with its document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique, derived as `{document_id}_chunk_{chunk_index}`.
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub doc_type: String,
    pub document_id: String,
    pub chunk_index: usize,
}

/// Build chunk records from split text, with contiguous indices from 0.
pub fn build_chunks(pieces: Vec<String>, metadata: &DocMetadata) -> Vec<Chunk> {
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            id: format!("{}_chunk_{}", metadata.id, i),
            text,
            metadata: ChunkMetadata {
                source: metadata.source.clone(),
                doc_type: metadata.doc_type.clone(),
                document_id: metadata.id.clone(),
                chunk_index: i,
            },
        })
        .collect()
}
