
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::documents::Document;
use crate::{RagError, Result};

/// A bounded substring of a source document, the unit of retrieval.
///
/// `start_offset` is the character offset of the chunk within the original
/// document, so a chunk is identified by `(source_path, start_offset)` even
/// when overlapping chunks repeat text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The chunk text, verbatim from the source document
    pub text: String,
    /// Path of the document this chunk was cut from
    pub source_path: String,
    /// Character offset of the chunk within the original document
    pub start_offset: usize,
    /// The index of this chunk within its document
    pub chunk_index: usize,
}

/// Configuration for document chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters from the tail of a chunk repeated at the head of the next
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 150,
        }
    }
}

/// Split documents into overlapping chunks with positional metadata.
///
/// Chunk boundaries prefer higher-level structure when one fits within
/// `chunk_size`: paragraph break, then line break, then sentence end, then
/// word boundary, then a hard character cut. A document shorter than
/// `chunk_size` yields exactly one chunk with `start_offset = 0`. Pure
/// function of its inputs.
#[inline]
pub fn split_documents(documents: &[Document], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    if config.chunk_size == 0 {
        return Err(RagError::Config(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if config.overlap >= config.chunk_size {
        return Err(RagError::Config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            config.overlap, config.chunk_size
        )));
    }

    let mut chunks = Vec::new();

    for document in documents {
        let windows = split_text(&document.raw_text, config.chunk_size, config.overlap);

        for (chunk_index, (start_offset, text)) in windows.into_iter().enumerate() {
            chunks.push(Chunk {
                text,
                source_path: document.source_path.clone(),
                start_offset,
                chunk_index,
            });
        }
    }

    debug!(
        "Split {} documents into {} chunks",
        documents.len(),
        chunks.len()
    );

    Ok(chunks)
}

/// Split a single text into `(start_offset, text)` windows. Offsets are in
/// characters. Empty text yields no windows.
fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut windows = Vec::new();

    if total == 0 {
        return windows;
    }

    let mut start = 0;
    loop {
        let hard_end = (start + chunk_size).min(total);
        let end = if hard_end == total {
            total
        } else {
            find_boundary(&chars, start, hard_end)
        };

        windows.push((start, chars[start..end].iter().collect()));

        if end == total {
            break;
        }

        // Guarantees forward progress even when a separator forced a chunk
        // shorter than the overlap window.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    windows
}

/// Find the best split point in `(start, hard_end]`, preferring paragraph
/// breaks, then line breaks, then sentence ends, then word boundaries. Falls
/// back to the hard character cut at `hard_end`.
fn find_boundary(chars: &[char], start: usize, hard_end: usize) -> usize {
    // Paragraph break: cut after the blank line.
    if hard_end >= start + 2 {
        for p in (start..=hard_end - 2).rev() {
            if chars[p] == '\n' && chars[p + 1] == '\n' {
                return p + 2;
            }
        }
    }

    // Line break.
    for p in (start..hard_end).rev() {
        if chars[p] == '\n' {
            return p + 1;
        }
    }

    // Sentence end: punctuation followed by whitespace, cut after both.
    if hard_end >= start + 2 {
        for p in (start..=hard_end - 2).rev() {
            if matches!(chars[p], '.' | '!' | '?') && chars[p + 1].is_whitespace() {
                return p + 2;
            }
        }
    }

    // Word boundary.
    for p in (start..hard_end).rev() {
        if chars[p] == ' ' {
            return p + 1;
        }
    }

    hard_end
}
