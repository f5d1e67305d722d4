//! In-memory [`Store`] implementation for testing and embedded use.
//!
//! Collections are `Vec`s of chunk records behind a single
//! `std::sync::RwLock`, so a file replacement is applied under one write
//! guard and is never observed half-done. Vector search is brute-force
//! cosine distance over the file's chunks.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::StoreError;
use crate::models::{ChunkHit, ChunkRecord, StoredChunk};

use super::{check_search_dims, validate_records, CollectionScope, Store};

/// In-memory store keyed by collection name.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<ChunkRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of collections created so far.
    pub fn collection_count(&self) -> usize {
        self.collections.read().map(|c| c.len()).unwrap_or(0)
    }
}

const POISONED: &str = "in-memory store lock poisoned";

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Query(POISONED.to_string())
}

fn poisoned_write<T>(_: T) -> StoreError {
    StoreError::Write(POISONED.to_string())
}

fn in_file<'a>(
    records: &'a [ChunkRecord],
    scope: &'a CollectionScope,
    file_id: &'a str,
) -> impl Iterator<Item = &'a ChunkRecord> + 'a {
    records.iter().filter(move |r| {
        r.metadata.owner == scope.owner().as_str() && r.metadata.file_id == file_id
    })
}

fn to_stored(r: &ChunkRecord) -> StoredChunk {
    StoredChunk {
        text: r.text.clone(),
        start_index: r.start_index,
        end_index: r.end_index,
        metadata: r.metadata.clone(),
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ensure_collection(&self, scope: &CollectionScope) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(poisoned_write)?;
        collections.entry(scope.name().to_string()).or_default();
        Ok(())
    }

    async fn replace_file_chunks(
        &self,
        scope: &CollectionScope,
        file_id: &str,
        records: &[ChunkRecord],
    ) -> Result<(), StoreError> {
        validate_records(scope, file_id, records)?;

        let mut collections = self.collections.write().map_err(poisoned_write)?;
        let collection = collections
            .get_mut(scope.name())
            .ok_or_else(|| StoreError::Write(format!("collection {} not found", scope.name())))?;

        let owner = scope.owner().as_str();
        collection.retain(|r| !(r.metadata.owner == owner && r.metadata.file_id == file_id));
        collection.extend(records.iter().cloned());
        Ok(())
    }

    async fn search(
        &self,
        scope: &CollectionScope,
        file_id: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkHit>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        let Some(collection) = collections.get(scope.name()) else {
            return Ok(Vec::new());
        };

        let mut hits = in_file(collection, scope, file_id)
            .map(|r| {
                check_search_dims(r.metadata.chunk_index, r.embedding.len(), query_vec.len())?;
                Ok(ChunkHit {
                    text: r.text.clone(),
                    metadata: r.metadata.clone(),
                    distance: cosine_distance(query_vec, &r.embedding),
                })
            })
            .collect::<Result<Vec<ChunkHit>, StoreError>>()?;

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn list_file_chunks(
        &self,
        scope: &CollectionScope,
        file_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredChunk>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        let Some(collection) = collections.get(scope.name()) else {
            return Ok(Vec::new());
        };
        Ok(in_file(collection, scope, file_id)
            .take(limit.unwrap_or(usize::MAX))
            .map(to_stored)
            .collect())
    }

    async fn delete_file_chunks(
        &self,
        scope: &CollectionScope,
        file_id: &str,
    ) -> Result<usize, StoreError> {
        let mut collections = self.collections.write().map_err(poisoned_write)?;
        let Some(collection) = collections.get_mut(scope.name()) else {
            return Ok(0);
        };
        let owner = scope.owner().as_str();
        let before = collection.len();
        collection.retain(|r| !(r.metadata.owner == owner && r.metadata.file_id == file_id));
        Ok(before - collection.len())
    }
}
