//! Text chunking with configurable size and overlap.
//!
//! Windows are measured in characters, not bytes, so multi-byte text never
//! splits inside a code point.

use crate::types::{Chunk, Document};
use regula_core::{AppError, AppResult};

/// Default window length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 800;

/// Default number of characters shared by consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Chunks shorter than this (after trimming) are dropped.
pub const MIN_CHUNK_CHARS: usize = 80;

/// Chunks with fewer alphabetic characters than this are dropped.
pub const MIN_ALPHA_CHARS: usize = 30;

/// A raw window over a text, before trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    /// Start offset in characters
    pub start: usize,

    /// End offset in characters (exclusive)
    pub end: usize,

    /// Untrimmed window text
    pub text: &'a str,
}

/// Check that a window configuration can make progress.
pub fn validate_window(chunk_size: usize, overlap: usize) -> AppResult<()> {
    if chunk_size == 0 {
        return Err(AppError::InvalidArgument(
            "chunk_size must be greater than 0".to_string(),
        ));
    }

    if overlap >= chunk_size {
        return Err(AppError::InvalidArgument(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    Ok(())
}

/// Split text into fixed-length overlapping windows.
///
/// Windows start at character offsets `0, s, 2s, ...` with
/// `s = chunk_size - overlap` and stop at the first window that reaches the
/// end of the text, which may be shorter than `chunk_size`.
pub fn windows(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<Window<'_>>> {
    validate_window(chunk_size, overlap)?;

    // Byte offset of every char boundary, plus the end of the text
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;
    let step = chunk_size - overlap;

    let mut out = Vec::new();
    let mut start = 0;
    while start < len {
        let end = start.saturating_add(chunk_size).min(len);
        out.push(Window {
            start,
            end,
            text: &text[bounds[start]..bounds[end]],
        });
        if end == len {
            break;
        }
        start += step;
    }

    Ok(out)
}

/// Chunk text into trimmed, non-empty overlapping segments.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<String>> {
    let chunks: Vec<String> = windows(text, chunk_size, overlap)?
        .into_iter()
        .map(|w| w.text.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

/// Low-information chunks: too short, or mostly digits and punctuation.
pub fn is_bad_chunk(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_CHUNK_CHARS {
        return true;
    }

    trimmed.chars().filter(|c| c.is_alphabetic()).count() < MIN_ALPHA_CHARS
}

/// Chunk every document and drop low-information chunks.
///
/// Chunk indices are dense per source: they count retained chunks only.
pub fn chunk_documents(
    documents: &[Document],
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<Chunk>> {
    validate_window(chunk_size, overlap)?;

    let mut chunks = Vec::new();
    let mut dropped = 0usize;

    for document in documents {
        let mut index = 0usize;
        for text in chunk_text(&document.text, chunk_size, overlap)? {
            if is_bad_chunk(&text) {
                dropped += 1;
                continue;
            }
            chunks.push(Chunk::new(document.source.as_str(), index, text));
            index += 1;
        }

        tracing::debug!("'{}' produced {} chunks", document.source, index);
    }

    tracing::info!(
        "Created {} chunks from {} documents ({} dropped by quality filter)",
        chunks.len(),
        documents.len(),
        dropped
    );

    Ok(chunks)
}
