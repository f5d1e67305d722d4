//! Overlapping word-window text chunker.
//!
//! Splits extracted document text into [`Chunk`]s of at most `chunk_size`
//! whitespace-delimited words. Consecutive windows share `overlap` words
//! so that sentences straddling a boundary stay retrievable from either
//! side.
//!
//! # Algorithm
//!
//! 1. Reject text shorter than `min_chars` (after trimming).
//! 2. Split the text on whitespace into `N` words.
//! 3. Starting at `i = 0`, emit the window `[i, min(i + chunk_size, N))`.
//! 4. Advance `i += chunk_size - overlap` and repeat while `i < N`.
//!
//! # Example
//!
//! ```rust
//! use coursemaster_core::chunk::{chunk_words, ChunkingParams};
//!
//! let text = (0..600).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
//! let chunks = chunk_words(&text, &ChunkingParams::default()).unwrap();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!((chunks[1].start_index, chunks[1].end_index), (462, 600));
//! ```

use crate::error::RagError;
use crate::models::Chunk;

/// Default window size in words.
pub const DEFAULT_CHUNK_SIZE: usize = 512;
/// Default number of words shared by adjacent windows.
pub const DEFAULT_OVERLAP: usize = 50;
/// Default minimum length (characters) of indexable text.
pub const DEFAULT_MIN_CHARS: usize = 50;

/// Chunking parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_chars: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            min_chars: DEFAULT_MIN_CHARS,
        }
    }
}

impl ChunkingParams {
    /// Fails unless `0 <= overlap < chunk_size`; otherwise the window would never advance.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Distance between the start offsets of consecutive windows.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split `text` into overlapping word windows.
///
/// # Guarantees
///
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - The union of `[start_index, end_index)` ranges is `[0, words)`.
/// - Every chunk after the first starts `overlap` words before its
///   predecessor ends.
///
/// # Errors
///
/// - [`RagError::Configuration`] if the parameters are invalid.
/// - [`RagError::ExtractionTooShort`] if the trimmed text has fewer than
///   `min_chars` characters.
pub fn chunk_words(text: &str, params: &ChunkingParams) -> Result<Vec<Chunk>, RagError> {
    params.validate()?;

    let chars = text.trim().chars().count();
    if chars == 0 || chars < params.min_chars {
        return Err(RagError::ExtractionTooShort {
            chars,
            min: params.min_chars,
        });
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let stride = params.stride();
    let mut chunks = Vec::with_capacity(words.len().div_ceil(stride));
    let mut start = 0;

    while start < words.len() {
        let end = (start + params.chunk_size).min(words.len());
        chunks.push(Chunk {
            chunk_index: chunks.len(),
            text: words[start..end].join(" "),
            start_index: start,
            end_index: end,
        });
        start += stride;
    }

    Ok(chunks)
}
