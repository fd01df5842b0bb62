//! PDF text extraction.
//!
//! Page text comes from `pdf-extract`; document properties (title, author,
//! page count) from `lopdf`. Missing properties fall back to
//! "Untitled"/"Unknown" and never fail extraction.

use std::path::Path;

use lopdf::{Document, Object};

use super::DocMetadata;
use crate::core::errors::ApiError;

pub struct PdfExtractor;

impl PdfExtractor {
    pub async fn extract(
        &self,
        path: &Path,
        source_name: &str,
    ) -> Result<(String, DocMetadata), ApiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Extraction(format!("failed to read PDF: {}", e)))?;

        let source = source_name.to_string();
        // PDF parsing is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || extract_sync(&bytes, &source))
            .await
            .map_err(|e| ApiError::Internal(format!("extraction task failed: {}", e)))?
    }
}

fn extract_sync(bytes: &[u8], source: &str) -> Result<(String, DocMetadata), ApiError> {
    let document = Document::load_mem(bytes)
        .map_err(|e| ApiError::Extraction(format!("error processing PDF: {}", e)))?;

    let pages = document.get_pages().len();
    let title = info_string(&document, b"Title").unwrap_or_else(|| "Untitled".to_string());
    let author = info_string(&document, b"Author").unwrap_or_else(|| "Unknown".to_string());

    let page_texts = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ApiError::Extraction(format!("error processing PDF: {}", e)))?;

    let mut text = String::new();
    for (page_num, page_text) in page_texts.iter().enumerate() {
        if page_text.trim().is_empty() {
            continue;
        }
        text.push_str(&format!("\n\n--- Page {} ---\n\n{}", page_num + 1, page_text));
    }

    let metadata = DocMetadata::new_pdf(source, title, author, pages);
    Ok((text, metadata))
}

/// Read a string entry from the document's Info dictionary, if any.
fn info_string(document: &Document, key: &[u8]) -> Option<String> {
    let info = match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?.as_dict().ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };

    let raw = info.get(key).ok()?.as_str().ok()?;
    let value = decode_pdf_string(raw);
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// PDF text strings are either UTF-16BE with a BOM or PDFDocEncoding;
/// the latter is close enough to Latin-1 for title/author fields.
fn decode_pdf_string(raw: &[u8]) -> String {
    if raw.len() >= 2 && raw[0] == 0xFE && raw[1] == 0xFF {
        let utf16: Vec<u16> = raw[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&utf16)
    } else {
        raw.iter().map(|&b| b as char).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_bom_strings_decode() {
        let raw = [0xFE, 0xFF, 0x00, b'H', 0x00, b'i'];
        assert_eq!(decode_pdf_string(&raw), "Hi");
    }

    #[test]
    fn plain_strings_decode() {
        assert_eq!(decode_pdf_string(b"Report"), "Report");
    }

    #[tokio::test]
    async fn corrupt_pdf_fails_with_extraction_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.pdf");
        tokio::fs::write(&path, b"not a pdf at all").await.unwrap();

        let result = PdfExtractor.extract(&path, "bad.pdf").await;
        assert!(matches!(result, Err(ApiError::Extraction(_))));
    }
}
