//! CSV extraction.
//!
//! Serializes a tabular file into a deterministic text projection: a
//! column manifest, descriptive statistics for numeric columns, then a
//! row-by-row dump. This projection is what gets chunked and embedded;
//! there is no separate structured-query path.

use std::path::Path;

use super::DocMetadata;
use crate::core::errors::ApiError;

pub struct CsvExtractor;

impl CsvExtractor {
    pub async fn extract(
        &self,
        path: &Path,
        source_name: &str,
    ) -> Result<(String, DocMetadata), ApiError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ApiError::Extraction(format!("failed to read CSV: {}", e)))?;

        let source = source_name.to_string();
        tokio::task::spawn_blocking(move || extract_sync(&raw, &source))
            .await
            .map_err(|e| ApiError::Internal(format!("extraction task failed: {}", e)))?
    }
}

fn extract_sync(raw: &str, source: &str) -> Result<(String, DocMetadata), ApiError> {
    let mut reader = csv::Reader::from_reader(raw.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ApiError::Extraction(format!("error processing CSV: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut records: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| ApiError::Extraction(format!("error processing CSV: {}", e)))?;
        records.push(record.iter().map(|field| field.to_string()).collect());
    }

    let mut text = format!("CSV File: {}\n\n", source);
    text.push_str(&format!("Columns: {}\n\n", headers.join(", ")));

    text.push_str("Summary Statistics:\n");
    for (col_idx, header) in headers.iter().enumerate() {
        if let Some(stats) = column_stats(&records, col_idx) {
            text.push_str(&format!("  {}:\n", header));
            text.push_str(&format!("    Mean: {}\n", stats.mean));
            text.push_str(&format!("    Min: {}\n", stats.min));
            text.push_str(&format!("    Max: {}\n", stats.max));
            text.push_str(&format!("    Median: {}\n\n", stats.median));
        }
    }

    text.push_str("\nData Rows:\n");
    for (row_idx, record) in records.iter().enumerate() {
        text.push_str(&format!("Row {}:\n", row_idx + 1));
        for (col_idx, header) in headers.iter().enumerate() {
            let value = record.get(col_idx).map(String::as_str).unwrap_or("");
            text.push_str(&format!("  {}: {}\n", header, value));
        }
        text.push('\n');
    }

    let metadata = DocMetadata::new_csv(source, records.len(), headers);
    Ok((text, metadata))
}

struct ColumnStats {
    mean: f64,
    min: f64,
    max: f64,
    median: f64,
}

/// Descriptive statistics for a column, or `None` unless every non-empty
/// value parses as a number (with at least one value present).
fn column_stats(records: &[Vec<String>], col_idx: usize) -> Option<ColumnStats> {
    let mut values: Vec<f64> = Vec::new();
    for record in records {
        let field = record.get(col_idx)?.trim();
        if field.is_empty() {
            continue;
        }
        match field.parse::<f64>() {
            Ok(value) => values.push(value),
            Err(_) => return None,
        }
    }

    if values.is_empty() {
        return None;
    }

    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let min = values[0];
    let max = values[values.len() - 1];
    let median = if values.len() % 2 == 1 {
        values[values.len() / 2]
    } else {
        let mid = values.len() / 2;
        (values[mid - 1] + values[mid]) / 2.0
    };

    Some(ColumnStats { mean, min, max, median })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn extract_str(raw: &str) -> (String, DocMetadata) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.csv");
        tokio::fs::write(&path, raw).await.unwrap();
        CsvExtractor.extract(&path, "data.csv").await.unwrap()
    }

    #[tokio::test]
    async fn projects_columns_stats_and_rows() {
        let (text, metadata) =
            extract_str("name,age\nalice,30\nbob,40\ncarol,50\n").await;

        assert!(text.starts_with("CSV File: data.csv"));
        assert!(text.contains("Columns: name, age"));
        // age is numeric, name is not
        assert!(text.contains("  age:\n    Mean: 40\n    Min: 30\n    Max: 50\n    Median: 40"));
        assert!(!text.contains("  name:\n    Mean"));
        assert!(text.contains("Row 1:\n  name: alice\n  age: 30"));
        assert!(text.contains("Row 3:\n  name: carol\n  age: 50"));

        assert_eq!(metadata.doc_type, "csv");
        assert_eq!(metadata.rows, Some(3));
        assert_eq!(
            metadata.columns,
            Some(vec!["name".to_string(), "age".to_string()])
        );
    }

    #[tokio::test]
    async fn even_count_median_averages_middle_values() {
        let (text, _) = extract_str("x\n1\n2\n3\n10\n").await;
        assert!(text.contains("Median: 2.5"));
        assert!(text.contains("Mean: 4"));
    }

    #[tokio::test]
    async fn ragged_rows_fail_extraction() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.csv");
        tokio::fs::write(&path, "a,b\n1,2\n3\n").await.unwrap();

        let result = CsvExtractor.extract(&path, "bad.csv").await;
        assert!(matches!(result, Err(ApiError::Extraction(_))));
    }
}
