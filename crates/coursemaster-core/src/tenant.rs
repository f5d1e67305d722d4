//! Owner → collection registry.
//!
//! [`TenantCollections`] hands out exactly one [`Collection`] per owner,
//! creating it in the backing [`Store`] on first access and caching the
//! handle for the lifetime of the registry. All chunk reads and writes go
//! through a [`Collection`], which carries its owner scope and cannot be
//! pointed at another owner's data.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::StoreError;
use crate::models::{ChunkHit, ChunkRecord, OwnerId, StoredChunk};
use crate::store::{CollectionScope, Store};

/// Handle to one owner's collection.
pub struct Collection {
    scope: CollectionScope,
    store: Arc<dyn Store>,
}

impl Collection {
    pub fn owner(&self) -> &OwnerId {
        self.scope.owner()
    }

    pub fn name(&self) -> &str {
        self.scope.name()
    }

    /// Atomically replace every chunk of `file_id`.
    pub async fn replace_file(
        &self,
        file_id: &str,
        records: &[ChunkRecord],
    ) -> Result<(), StoreError> {
        self.store
            .replace_file_chunks(&self.scope, file_id, records)
            .await
    }

    pub async fn search(
        &self,
        file_id: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkHit>, StoreError> {
        self.store
            .search(&self.scope, file_id, query_vec, limit)
            .await
    }

    pub async fn list(
        &self,
        file_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredChunk>, StoreError> {
        self.store.list_file_chunks(&self.scope, file_id, limit).await
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<usize, StoreError> {
        self.store.delete_file_chunks(&self.scope, file_id).await
    }
}

/// Lazily populated mapping from owner identity to collection handle.
pub struct TenantCollections {
    store: Arc<dyn Store>,
    handles: RwLock<HashMap<OwnerId, Arc<Collection>>>,
}

impl TenantCollections {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Return the collection for `owner`, creating it on first access.
    pub async fn collection(&self, owner: &OwnerId) -> Result<Arc<Collection>, StoreError> {
        if let Some(handle) = self.cached(owner) {
            return Ok(handle);
        }

        let scope = CollectionScope::for_owner(owner);
        self.store.ensure_collection(&scope).await?;
        debug!(owner = %owner, collection = scope.name(), "collection ready");

        let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
        let handle = handles.entry(owner.clone()).or_insert_with(|| {
            Arc::new(Collection {
                scope,
                store: Arc::clone(&self.store),
            })
        });
        Ok(Arc::clone(handle))
    }

    /// Number of owners with a cached handle.
    pub fn len(&self) -> usize {
        self.handles.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cached(&self, owner: &OwnerId) -> Option<Arc<Collection>> {
        self.handles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(owner)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    #[tokio::test]
    async fn test_collection_created_once_and_reused() {
        let store = Arc::new(InMemoryStore::new());
        let tenants = TenantCollections::new(store.clone());
        let alice = OwnerId::new("alice").unwrap();

        let a1 = tenants.collection(&alice).await.unwrap();
        let a2 = tenants.collection(&alice).await.unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        assert_eq!(a1.name(), "user_alice");
        assert_eq!(tenants.len(), 1);
        assert_eq!(store.collection_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_owners_get_distinct_collections() {
        let tenants = TenantCollections::new(Arc::new(InMemoryStore::new()));
        let a = tenants.collection(&OwnerId::new("alice").unwrap()).await.unwrap();
        let b = tenants.collection(&OwnerId::new("bob").unwrap()).await.unwrap();
        assert_ne!(a.name(), b.name());
        assert_eq!(b.owner().as_str(), "bob");
        assert_eq!(tenants.len(), 2);
    }
}
