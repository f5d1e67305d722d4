//! Core data models used throughout the retrieval engine.
//!
//! These types represent the owners, chunks, query results, and weakness
//! records that flow through indexing, retrieval, and aggregation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// Identity of the user that owns a tenant collection.
///
/// Construction through [`OwnerId::new`] rejects empty identities, so a
/// value of this type is always a valid scope for store operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Result<Self, RagError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RagError::InvalidOwner);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contiguous word window produced by the chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Sequential id within the document, starting at 0.
    pub chunk_index: usize,
    /// Window words joined by single spaces.
    pub text: String,
    /// First word offset (inclusive).
    pub start_index: usize,
    /// Last word offset (exclusive).
    pub end_index: usize,
}

/// Metadata stored alongside every chunk vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_id: String,
    pub chunk_index: usize,
    pub owner: String,
}

/// A fully embedded chunk, ready to be written to a tenant collection.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Stable composite key, see [`chunk_key`].
    pub key: String,
    pub text: String,
    pub start_index: usize,
    pub end_index: usize,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// A chunk as read back from a collection, without its vector.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub text: String,
    pub start_index: usize,
    pub end_index: usize,
    pub metadata: ChunkMetadata,
}

/// A nearest-neighbour hit returned from a [`Store`](crate::store::Store).
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance (`1 − cosine similarity`), lower is closer.
    pub distance: f64,
}

/// One ranked entry of a [`QueryResponse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResultEntry {
    pub text: String,
    /// `1 − distance`. Only a ranking key: with cosine distance it lies in `[-1, 1]`.
    pub score: f64,
    pub metadata: ChunkMetadata,
}

/// Result of a scoped similarity query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResponse {
    pub chunks: Vec<QueryResultEntry>,
    pub total_results: usize,
}

impl QueryResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(chunks: Vec<QueryResultEntry>) -> Self {
        let total_results = chunks.len();
        Self {
            chunks,
            total_results,
        }
    }
}

/// Summary of a successful [`index_document`](crate::engine::RagEngine::index_document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub total_chunks: usize,
    pub total_chars: usize,
}

/// Per-document totals derived from the stored chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub owner: String,
    pub file_id: String,
    pub total_chunks: usize,
    /// Sum of stored chunk text lengths. Words shared by overlapping
    /// chunks count once per chunk, so this is not the source length
    /// reported by [`IndexReport::total_chars`].
    pub stored_chars: usize,
}

/// Per-user, per-concept miss counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeaknessRecord {
    pub owner: String,
    pub concept: String,
    pub frequency: u32,
    pub last_incorrect_at: DateTime<Utc>,
}

/// A question the user answered incorrectly during grading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedAnswer {
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    /// Concept tag attached to the question by the quiz author, if any.
    pub concept: Option<String>,
}

/// Wire-ready view of an indexing attempt.
///
/// Serializes as `{"success": true, "total_chunks": .., "total_chars": ..}`
/// or `{"success": false, "error": ".."}`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chars: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<IndexReport, RagError>> for IndexOutcome {
    fn from(result: &Result<IndexReport, RagError>) -> Self {
        match result {
            Ok(report) => Self {
                success: true,
                total_chunks: Some(report.total_chunks),
                total_chars: Some(report.total_chars),
                error: None,
            },
            Err(e) => Self {
                success: false,
                total_chunks: None,
                total_chars: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Wire-ready view of a query: the response itself or `{"error": ".."}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Found(QueryResponse),
    Failed { error: String },
}

impl From<Result<QueryResponse, RagError>> for QueryOutcome {
    fn from(result: Result<QueryResponse, RagError>) -> Self {
        match result {
            Ok(resp) => Self::Found(resp),
            Err(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }
}

/// Stable composite key for a chunk: `{file_id}_chunk_{chunk_index}`.
pub fn chunk_key(file_id: &str, chunk_index: usize) -> String {
    format!("{}_chunk_{}", file_id, chunk_index)
}
