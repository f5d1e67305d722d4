//! Storage abstraction for tenant-scoped chunk vectors.
//!
//! The [`Store`] trait defines every chunk operation needed by indexing
//! and retrieval, enabling pluggable backends (SQLite in the app crate,
//! in-memory here). Every method takes a [`CollectionScope`], which can
//! only be built from a validated [`OwnerId`], so a backend never sees an
//! unscoped request.
//!
//! Implementations must be `Send + Sync` and provide their own internal
//! concurrency control.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{ChunkHit, ChunkRecord, OwnerId, StoredChunk};

/// The logical collection of one owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionScope {
    name: String,
    owner: OwnerId,
}

impl CollectionScope {
    /// Scope for `owner`'s collection, named `user_{owner}`.
    pub fn for_owner(owner: &OwnerId) -> Self {
        Self {
            name: format!("user_{}", owner),
            owner: owner.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }
}

/// Abstract vector storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection`](Store::ensure_collection) | Create the owner's collection if missing |
/// | [`replace_file_chunks`](Store::replace_file_chunks) | Atomically replace all chunks of one file |
/// | [`search`](Store::search) | Cosine nearest-neighbour search within one file |
/// | [`list_file_chunks`](Store::list_file_chunks) | Chunks of one file in insertion order |
/// | [`delete_file_chunks`](Store::delete_file_chunks) | Remove all chunks of one file |
#[async_trait]
pub trait Store: Send + Sync {
    /// Create the collection for `scope` if it does not exist yet. Idempotent.
    async fn ensure_collection(&self, scope: &CollectionScope) -> Result<(), StoreError>;

    /// Replace every chunk of `file_id` in `scope` with `records`.
    ///
    /// All-or-nothing: on error the previous chunks of the file are left
    /// untouched and none of `records` is visible.
    async fn replace_file_chunks(
        &self,
        scope: &CollectionScope,
        file_id: &str,
        records: &[ChunkRecord],
    ) -> Result<(), StoreError>;

    /// Return up to `limit` chunks of `file_id` closest to `query_vec`,
    /// ordered by ascending cosine distance. Equal distances keep
    /// insertion order. Fails with [`StoreError::Query`] if a stored
    /// vector's dimension differs from `query_vec`.
    async fn search(
        &self,
        scope: &CollectionScope,
        file_id: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkHit>, StoreError>;

    /// Return chunks of `file_id` in insertion order, at most `limit` if given.
    async fn list_file_chunks(
        &self,
        scope: &CollectionScope,
        file_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredChunk>, StoreError>;

    /// Delete all chunks of `file_id` in `scope`, returning how many were removed.
    async fn delete_file_chunks(
        &self,
        scope: &CollectionScope,
        file_id: &str,
    ) -> Result<usize, StoreError>;
}

/// Check that every record belongs to `scope` and `file_id` and that all
/// vectors share one dimension. Backends call this before writing.
pub fn validate_records(
    scope: &CollectionScope,
    file_id: &str,
    records: &[ChunkRecord],
) -> Result<(), StoreError> {
    let dims = records.first().map(|r| r.embedding.len());
    for r in records {
        if r.metadata.owner != scope.owner().as_str() {
            return Err(StoreError::Write(format!(
                "chunk {} belongs to owner {}, not {}",
                r.key,
                r.metadata.owner,
                scope.owner()
            )));
        }
        if r.metadata.file_id != file_id {
            return Err(StoreError::Write(format!(
                "chunk {} belongs to file {}, not {}",
                r.key, r.metadata.file_id, file_id
            )));
        }
        if Some(r.embedding.len()) != dims || r.embedding.is_empty() {
            return Err(StoreError::Write(format!(
                "chunk {} has an embedding of dimension {}, expected {}",
                r.key,
                r.embedding.len(),
                dims.unwrap_or(0)
            )));
        }
    }
    Ok(())
}

/// Reject a search whose query vector cannot be compared with a stored one.
pub fn check_search_dims(
    chunk_index: usize,
    stored: usize,
    query: usize,
) -> Result<(), StoreError> {
    if stored != query {
        return Err(StoreError::Query(format!(
            "chunk {} has an embedding of dimension {}, query has {}",
            chunk_index, stored, query
        )));
    }
    Ok(())
}
