//! SQLite-backed [`Store`] implementation.
//!
//! Chunks of every owner live in one `chunks` table; each owner's
//! collection is a row in `collections`, and every statement filters on
//! the scope's owner so one collection can never see another's rows.
//! Vector search is brute-force cosine over the file's rows, computed in
//! Rust after loading the embedding BLOBs.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use coursemaster_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use coursemaster_core::error::StoreError;
use coursemaster_core::models::{ChunkHit, ChunkMetadata, ChunkRecord, StoredChunk};
use coursemaster_core::store::{check_search_dims, validate_records, CollectionScope, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn write_err(e: sqlx::Error) -> StoreError {
    StoreError::Write(e.to_string())
}

fn query_err(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

fn metadata(row: &sqlx::sqlite::SqliteRow, scope: &CollectionScope, file_id: &str) -> ChunkMetadata {
    let chunk_index: i64 = row.get("chunk_index");
    ChunkMetadata {
        file_id: file_id.to_string(),
        chunk_index: chunk_index as usize,
        owner: scope.owner().to_string(),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn ensure_collection(&self, scope: &CollectionScope) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO collections (name, owner, created_at) VALUES (?, ?, ?)")
            .bind(scope.name())
            .bind(scope.owner().as_str())
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(write_err)?;
        Ok(())
    }

    async fn replace_file_chunks(
        &self,
        scope: &CollectionScope,
        file_id: &str,
        records: &[ChunkRecord],
    ) -> Result<(), StoreError> {
        validate_records(scope, file_id, records)?;
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(write_err)?;

        let removed = sqlx::query("DELETE FROM chunks WHERE owner = ? AND file_id = ?")
            .bind(scope.owner().as_str())
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?
            .rows_affected();

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO chunks (collection, owner, file_id, chunk_index, key, text,
                                    start_index, end_index, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(scope.name())
            .bind(scope.owner().as_str())
            .bind(file_id)
            .bind(record.metadata.chunk_index as i64)
            .bind(&record.key)
            .bind(&record.text)
            .bind(record.start_index as i64)
            .bind(record.end_index as i64)
            .bind(vec_to_blob(&record.embedding))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(write_err)?;
        debug!(
            collection = scope.name(),
            file_id,
            removed,
            inserted = records.len(),
            "replaced file chunks"
        );
        Ok(())
    }

    async fn search(
        &self,
        scope: &CollectionScope,
        file_id: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkHit>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT chunk_index, text, embedding
            FROM chunks
            WHERE owner = ? AND file_id = ?
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(scope.owner().as_str())
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        let mut hits = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                let metadata = metadata(row, scope, file_id);
                check_search_dims(metadata.chunk_index, stored.len(), query_vec.len())?;
                Ok(ChunkHit {
                    text: row.get("text"),
                    metadata,
                    distance: cosine_distance(query_vec, &stored),
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
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(
            r#"
            SELECT chunk_index, text, start_index, end_index
            FROM chunks
            WHERE owner = ? AND file_id = ?
            ORDER BY chunk_index ASC
            LIMIT ?
            "#,
        )
        .bind(scope.owner().as_str())
        .bind(file_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                let start: i64 = row.get("start_index");
                let end: i64 = row.get("end_index");
                StoredChunk {
                    text: row.get("text"),
                    start_index: start as usize,
                    end_index: end as usize,
                    metadata: metadata(row, scope, file_id),
                }
            })
            .collect())
    }

    async fn delete_file_chunks(
        &self,
        scope: &CollectionScope,
        file_id: &str,
    ) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM chunks WHERE owner = ? AND file_id = ?")
            .bind(scope.owner().as_str())
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use coursemaster_core::models::{chunk_key, OwnerId};
    use tempfile::TempDir;

    async fn store() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::minimal();
        config.store.path = tmp.path().join("cm.sqlite");
        let pool = db::connect(&config).await.unwrap();
        migrate::apply(&pool).await.unwrap();
        (tmp, SqliteStore::new(pool))
    }

    fn record(owner: &str, file_id: &str, idx: usize, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            key: chunk_key(file_id, idx),
            text: format!("chunk {} of {}", idx, file_id),
            start_index: idx * 10,
            end_index: idx * 10 + 10,
            metadata: ChunkMetadata {
                file_id: file_id.to_string(),
                chunk_index: idx,
                owner: owner.to_string(),
            },
            embedding,
        }
    }

    fn scope(owner: &str) -> CollectionScope {
        CollectionScope::for_owner(&OwnerId::new(owner).unwrap())
    }

    #[tokio::test]
    async fn test_replace_and_search_ordered_by_distance() {
        let (_tmp, store) = store().await;
        let alice = scope("alice");
        store.ensure_collection(&alice).await.unwrap();
        store.ensure_collection(&alice).await.unwrap();

        let records = vec![
            record("alice", "f1", 0, vec![0.0, 1.0]),
            record("alice", "f1", 1, vec![1.0, 0.0]),
            record("alice", "f1", 2, vec![0.7, 0.7]),
        ];
        store.replace_file_chunks(&alice, "f1", &records).await.unwrap();

        let hits = store.search(&alice, "f1", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.chunk_index, 1);
        assert!(hits[0].distance.abs() < 1e-6);
        assert_eq!(hits[1].metadata.chunk_index, 2);
    }

    #[tokio::test]
    async fn test_owner_filter_and_delete_count() {
        let (_tmp, store) = store().await;
        let (alice, bob) = (scope("alice"), scope("bob"));
        store.ensure_collection(&alice).await.unwrap();
        store.ensure_collection(&bob).await.unwrap();
        store
            .replace_file_chunks(&alice, "f1", &[record("alice", "f1", 0, vec![1.0])])
            .await
            .unwrap();
        store
            .replace_file_chunks(&bob, "f1", &[record("bob", "f1", 0, vec![1.0])])
            .await
            .unwrap();

        let listed = store.list_file_chunks(&alice, "f1", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].metadata.owner, "alice");

        assert_eq!(store.delete_file_chunks(&bob, "f1").await.unwrap(), 1);
        assert_eq!(store.delete_file_chunks(&bob, "f1").await.unwrap(), 0);
        assert_eq!(store.list_file_chunks(&alice, "f1", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_batch_leaves_previous_chunks() {
        let (_tmp, store) = store().await;
        let alice = scope("alice");
        store.ensure_collection(&alice).await.unwrap();
        store
            .replace_file_chunks(&alice, "f1", &[record("alice", "f1", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        // Duplicate chunk_index violates the unique constraint mid-transaction
        let bad = vec![
            record("alice", "f1", 0, vec![0.0, 1.0]),
            record("alice", "f1", 0, vec![0.0, 1.0]),
        ];
        let err = store.replace_file_chunks(&alice, "f1", &bad).await.unwrap_err();
        assert!(matches!(err, StoreError::Write(_)));

        let listed = store.list_file_chunks(&alice, "f1", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].text, "chunk 0 of f1");
        let hits = store.search(&alice, "f1", &[1.0, 0.0], 1).await.unwrap();
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_list_limit_keeps_insertion_order() {
        let (_tmp, store) = store().await;
        let alice = scope("alice");
        store.ensure_collection(&alice).await.unwrap();
        let records: Vec<ChunkRecord> =
            (0..5).map(|i| record("alice", "f1", i, vec![1.0])).collect();
        store.replace_file_chunks(&alice, "f1", &records).await.unwrap();

        let listed = store.list_file_chunks(&alice, "f1", Some(3)).await.unwrap();
        let order: Vec<usize> = listed.iter().map(|c| c.metadata.chunk_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(listed[2].start_index, 20);
    }

    #[tokio::test]
    async fn test_search_rejects_query_of_other_dimension() {
        let (_tmp, store) = store().await;
        let alice = scope("alice");
        store.ensure_collection(&alice).await.unwrap();
        store
            .replace_file_chunks(&alice, "f1", &[record("alice", "f1", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        let err = store.search(&alice, "f1", &[1.0, 0.0, 0.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
        assert_eq!(store.search(&alice, "f1", &[0.0, 1.0], 3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_write_without_collection_fails() {
        let (_tmp, store) = store().await;
        let err = store
            .replace_file_chunks(&scope("ghost"), "f1", &[record("ghost", "f1", 0, vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Write(_)));
    }
}
