//! Recursive-separator text splitter.
//!
//! Splits extracted document text into overlapping windows, preferring
//! paragraph breaks, then sentence breaks, then raw character windows.
//! Only segments that still exceed the chunk size back off to the next
//! separator level.

use crate::core::errors::ApiError;

/// Separator hierarchy, coarsest first.
const SEPARATORS: [&str; 5] = ["\n\n", ". ", "! ", "? ", " "];

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker. `overlap >= chunk_size` is a configuration error
    /// and is rejected before any splitting can happen.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ApiError> {
        if chunk_size == 0 {
            return Err(ApiError::BadRequest(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(ApiError::BadRequest(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    /// Split text into ordered chunks of at most `chunk_size` characters,
    /// adjacent chunks sharing up to `overlap` characters.
    ///
    /// Empty (or whitespace-only) input yields an empty vec.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let segments = split_segments(text, self.chunk_size, &SEPARATORS);

        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for segment in segments {
            let segment_len = segment.chars().count();

            if current_len + segment_len > self.chunk_size && !current.is_empty() {
                chunks.push(current.clone());
                // Seed the next chunk with the previous tail, trimmed so the
                // new segment still fits within chunk_size.
                let carry = self
                    .overlap
                    .min(self.chunk_size.saturating_sub(segment_len));
                current = char_tail(&current, carry);
                current_len = current.chars().count();
            }

            current.push_str(&segment);
            current_len += segment_len;
        }

        // Push the raw remainder even if it is whitespace-only; dropping
        // it would lose characters from a zero-overlap reconstruction.
        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

/// Split text into segments no longer than `chunk_size`, backing off through
/// the separator hierarchy only for oversized pieces. All characters of the
/// input are preserved across the returned segments.
fn split_segments(text: &str, chunk_size: usize, separators: &[&str]) -> Vec<String> {
    if text.chars().count() <= chunk_size {
        return vec![text.to_string()];
    }

    let Some((separator, remaining)) = separators.split_first() else {
        return char_windows(text, chunk_size);
    };

    let mut segments = Vec::new();
    for piece in split_keeping_separator(text, separator) {
        if piece.chars().count() <= chunk_size {
            segments.push(piece.to_string());
        } else {
            segments.extend(split_segments(piece, chunk_size, remaining));
        }
    }
    segments
}

/// Split at a separator, keeping the separator attached to the preceding piece.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        pieces.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// Last-resort split of an atomic run into raw character windows.
fn char_windows(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|window| window.iter().collect())
        .collect()
}

/// The last `count` characters of `text`.
fn char_tail(text: &str, count: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.len().saturating_sub(count);
    chars[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = Chunker::new(100, 20).unwrap();
        assert!(chunker.split("").is_empty());
        assert!(chunker.split("   \n\n  ").is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(100, 150).is_err());
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 99).is_ok());
    }

    #[test]
    fn chunks_never_exceed_chunk_size() {
        let chunker = Chunker::new(80, 16).unwrap();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        for chunk in chunker.split(&text) {
            assert!(chunk.chars().count() <= 80, "oversized chunk: {:?}", chunk);
        }
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let chunker = Chunker::new(1000, 200).unwrap();
        let chunks = chunker.split("just a short note");
        assert_eq!(chunks, vec!["just a short note".to_string()]);
    }

    #[test]
    fn zero_overlap_concatenation_reconstructs_input() {
        let chunker = Chunker::new(50, 0).unwrap();
        let text = "First paragraph here.\n\nSecond paragraph follows. It has two sentences. \
                    Third piece of text rounds things out nicely."
            .to_string();
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn zero_overlap_keeps_trailing_whitespace() {
        let chunker = Chunker::new(4, 0).unwrap();
        let text = "abcdabcd    ";
        let chunks = chunker.split(text);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn adjacent_chunks_share_overlap() {
        let chunker = Chunker::new(60, 20).unwrap();
        let text = "one two three four five six seven eight nine ten. ".repeat(10);
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let shared = (1..=20).any(|k| pair[1].starts_with(char_tail(&pair[0], k).as_str()));
            assert!(
                shared,
                "no shared prefix between {:?} and {:?}",
                pair[0], pair[1]
            );
        }
    }

    #[test]
    fn splits_prefer_paragraph_boundaries() {
        let chunker = Chunker::new(30, 0).unwrap();
        let text = "short one\n\nshort two\n\nshort three";
        let chunks = chunker.split(text);
        // Paragraphs merge while they fit; no mid-word splits.
        for chunk in &chunks {
            assert!(!chunk.is_empty());
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn unbroken_run_falls_back_to_char_windows() {
        let chunker = Chunker::new(10, 0).unwrap();
        let text = "a".repeat(35);
        let chunks = chunker.split(&text);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let chunker = Chunker::new(10, 2).unwrap();
        let text = "日本語のテキストを分割します。".repeat(5);
        for chunk in chunker.split(&text) {
            assert!(chunk.chars().count() <= 10);
        }
    }
}
