use std::{fs, path::Path};

use tracing::debug;

use crate::DebateError;

/// Window settings for splitting a document into passages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    pub overlap: usize,
    /// Windows of this many characters or fewer are discarded.
    pub min_chars: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
            min_chars: 200,
        }
    }
}

/// Fixed-size, overlapping character windows over `text`.
pub fn chunk_text(text: &str, options: ChunkOptions) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = options.chunk_size.max(1);
    let step = size.saturating_sub(options.overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        if end - start > options.min_chars {
            chunks.push(chars[start..end].iter().collect());
        }
        start += step;
    }

    chunks
}

pub fn load_document(path: impl AsRef<Path>, options: ChunkOptions) -> Result<Vec<String>, DebateError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DebateError::DocumentNotFound(path.to_path_buf()));
    }

    let text = fs::read_to_string(path)?;
    let chunks = chunk_text(&text, options);
    debug!(path = %path.display(), chunks = chunks.len(), "document chunked");
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_overlap_and_short_tails_are_dropped() {
        let text = "a".repeat(1_000);
        let chunks = chunk_text(&text, ChunkOptions::default());

        // Windows start at 0, 400 and 800; the last one is only 200 chars.
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() == 500));
    }

    #[test]
    fn short_documents_produce_nothing() {
        assert!(chunk_text("too short", ChunkOptions::default()).is_empty());
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "é".repeat(900);
        let chunks = chunk_text(&text, ChunkOptions::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].chars().count(), 500);
    }

    #[test]
    fn missing_document_is_reported() {
        let error = load_document("/definitely/not/here.txt", ChunkOptions::default()).unwrap_err();
        assert!(matches!(error, DebateError::DocumentNotFound(_)));
    }
}
