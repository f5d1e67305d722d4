//! Error types for the retrieval engine.
//!
//! Every engine operation returns [`RagError`] so callers can tell
//! "no relevant content" (an empty, successful result) apart from
//! "the engine failed". Storage backends and embedders report their own
//! narrower error types, which convert into [`RagError`] via `From`.

use thiserror::Error;

/// Errors surfaced by [`RagEngine`](crate::engine::RagEngine) operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The extracted source text is shorter than the configured minimum.
    #[error("extracted text too short: {chars} characters (minimum {min})")]
    ExtractionTooShort {
        /// Character count of the rejected text.
        chars: usize,
        /// Configured minimum.
        min: usize,
    },

    /// Invalid engine configuration, e.g. `overlap >= chunk_size`.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The embedding model call failed or returned malformed output.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Writing chunks to the vector store failed. Nothing was committed.
    #[error("vector store write failed: {0}")]
    StoreWrite(String),

    /// Reading from the vector store failed.
    #[error("vector store query failed: {0}")]
    StoreQuery(String),

    /// No chunks exist for the given owner and file.
    #[error("document {file_id} is not indexed for owner {owner}")]
    DocumentNotIndexed {
        /// Owner the request was scoped to.
        owner: String,
        /// File that has no chunks.
        file_id: String,
    },

    /// The external concept classifier failed.
    #[error("concept classification failed: {0}")]
    Classification(String),

    /// The external generation service failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The owner identity was empty.
    #[error("owner identity must not be empty")]
    InvalidOwner,
}

/// Errors reported by [`Store`](crate::store::Store) and
/// [`WeaknessStore`](crate::weakness::WeaknessStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write or transaction failed.
    #[error("write failed: {0}")]
    Write(String),

    /// A read failed.
    #[error("query failed: {0}")]
    Query(String),
}

/// Error reported by an [`Embedder`](crate::embedding::Embedder).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EmbeddingError(pub String);

impl EmbeddingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<StoreError> for RagError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Write(msg) => Self::StoreWrite(msg),
            StoreError::Query(msg) => Self::StoreQuery(msg),
        }
    }
}

impl From<EmbeddingError> for RagError {
    fn from(err: EmbeddingError) -> Self {
        Self::Embedding(err.0)
    }
}
