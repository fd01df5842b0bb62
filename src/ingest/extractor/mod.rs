//! Format-specific text extraction.
//!
//! An [`Extractor`] is selected by file extension at ingestion time and
//! produces the same `(text, metadata)` contract for every format.

mod csv_file;
mod pdf;

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::errors::ApiError;

pub use csv_file::CsvExtractor;
pub use pdf::PdfExtractor;

/// Structural metadata captured at extraction time. Created once per
/// successful extraction; read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMetadata {
    pub id: String,
    pub source: String,
    pub doc_type: String,
    pub upload_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl DocMetadata {
    pub fn new_pdf(source: &str, title: String, author: String, pages: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.to_string(),
            doc_type: "pdf".to_string(),
            upload_time: Utc::now().to_rfc3339(),
            title: Some(title),
            author: Some(author),
            pages: Some(pages),
            rows: None,
            columns: None,
        }
    }

    pub fn new_csv(source: &str, rows: usize, columns: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.to_string(),
            doc_type: "csv".to_string(),
            upload_time: Utc::now().to_rfc3339(),
            title: None,
            author: None,
            pages: None,
            rows: Some(rows),
            columns: Some(columns),
        }
    }

    /// Short metadata-based summary, used as the immediate summary at
    /// upload time and as the fallback when model summarization fails.
    pub fn fallback_summary(&self) -> String {
        match self.doc_type.as_str() {
            "pdf" => {
                let pages = self
                    .pages
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                let mut summary = format!("This is a {}-page PDF document", pages);
                if let Some(title) = self.title.as_deref().filter(|t| *t != "Untitled") {
                    summary.push_str(&format!(" titled '{}'", title));
                }
                if let Some(author) = self.author.as_deref().filter(|a| *a != "Unknown") {
                    summary.push_str(&format!(" by {}", author));
                }
                summary.push('.');
                summary
            }
            "csv" => {
                let rows = self
                    .rows
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                let columns = self.columns.clone().unwrap_or_default();
                let mut summary = format!(
                    "This is a CSV file with {} rows and {} columns",
                    rows,
                    columns.len()
                );
                if !columns.is_empty() {
                    summary.push_str(&format!(": {}", columns.join(", ")));
                }
                summary.push('.');
                summary
            }
            other => format!("This is a document of type '{}'.", other),
        }
    }

    /// Trailing metadata block appended to model-generated summaries.
    pub fn summary_footer(&self) -> String {
        let mut footer = String::from("\n\nDocument Information:\n");
        match self.doc_type.as_str() {
            "pdf" => {
                if let Some(title) = self.title.as_deref().filter(|t| *t != "Untitled") {
                    footer.push_str(&format!("- Title: {}\n", title));
                }
                if let Some(author) = self.author.as_deref().filter(|a| *a != "Unknown") {
                    footer.push_str(&format!("- Author: {}\n", author));
                }
                if let Some(pages) = self.pages {
                    footer.push_str(&format!("- Pages: {}\n", pages));
                }
                footer.push_str("- Document Type: PDF");
            }
            "csv" => {
                if let Some(rows) = self.rows {
                    footer.push_str(&format!("- Rows: {}\n", rows));
                }
                if let Some(columns) = &self.columns {
                    footer.push_str(&format!("- Columns: {}\n", columns.join(", ")));
                }
                footer.push_str("- Document Type: CSV");
            }
            _ => {}
        }
        footer
    }
}

/// Format-specific extractor, dispatched by file extension.
pub enum Extractor {
    Pdf(PdfExtractor),
    Csv(CsvExtractor),
}

impl Extractor {
    /// Pick an extractor for a lowercase file extension (without the dot).
    /// Returns `None` for unsupported types.
    pub fn for_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(Extractor::Pdf(PdfExtractor)),
            "csv" => Some(Extractor::Csv(CsvExtractor)),
            _ => None,
        }
    }

    /// Extract raw text plus structural metadata from a file on disk.
    ///
    /// A corrupt or unreadable file fails with [`ApiError::Extraction`];
    /// the caller is responsible for cleaning up any partially written
    /// storage artifacts.
    pub async fn extract(
        &self,
        path: &Path,
        source_name: &str,
    ) -> Result<(String, DocMetadata), ApiError> {
        match self {
            Extractor::Pdf(pdf) => pdf.extract(path, source_name).await,
            Extractor::Csv(csv) => csv.extract(path, source_name).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_dispatch() {
        assert!(matches!(Extractor::for_extension("pdf"), Some(Extractor::Pdf(_))));
        assert!(matches!(Extractor::for_extension("csv"), Some(Extractor::Csv(_))));
        assert!(Extractor::for_extension("docx").is_none());
        assert!(Extractor::for_extension("").is_none());
    }

    #[test]
    fn pdf_fallback_summary_skips_missing_fields() {
        let metadata = DocMetadata::new_pdf(
            "report.pdf",
            "Untitled".to_string(),
            "Unknown".to_string(),
            12,
        );
        assert_eq!(metadata.fallback_summary(), "This is a 12-page PDF document.");

        let titled = DocMetadata::new_pdf(
            "report.pdf",
            "Quarterly Report".to_string(),
            "Jane Doe".to_string(),
            3,
        );
        assert_eq!(
            titled.fallback_summary(),
            "This is a 3-page PDF document titled 'Quarterly Report' by Jane Doe."
        );
    }

    #[test]
    fn csv_fallback_summary_lists_columns() {
        let metadata =
            DocMetadata::new_csv("data.csv", 100, vec!["name".to_string(), "age".to_string()]);
        assert_eq!(
            metadata.fallback_summary(),
            "This is a CSV file with 100 rows and 2 columns: name, age."
        );
    }
}
