//! SQLite-backed [`WeaknessStore`].
//!
//! One row per `(owner, concept)`. A miss event is applied inside one
//! transaction as an upsert per concept, so concurrent graders can never
//! lose an increment or create duplicate rows. `last_incorrect_at` is
//! RFC 3339 text with nanoseconds, so stamps read back exactly.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use coursemaster_core::error::StoreError;
use coursemaster_core::models::{OwnerId, WeaknessRecord};
use coursemaster_core::weakness::WeaknessStore;

pub struct SqliteWeaknessStore {
    pool: SqlitePool,
}

impl SqliteWeaknessStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn to_record(row: &sqlx::sqlite::SqliteRow) -> Result<WeaknessRecord, StoreError> {
    let frequency: i64 = row.get("frequency");
    let stamp: String = row.get("last_incorrect_at");
    let last_incorrect_at = DateTime::parse_from_rfc3339(&stamp)
        .map_err(|e| StoreError::Query(format!("invalid timestamp {}: {}", stamp, e)))?
        .with_timezone(&Utc);
    Ok(WeaknessRecord {
        owner: row.get("owner"),
        concept: row.get("concept"),
        frequency: frequency as u32,
        last_incorrect_at,
    })
}

#[async_trait]
impl WeaknessStore for SqliteWeaknessStore {
    async fn record_misses(
        &self,
        owner: &OwnerId,
        concepts: &[String],
        at: DateTime<Utc>,
    ) -> Result<Vec<WeaknessRecord>, StoreError> {
        let write = |e: sqlx::Error| StoreError::Write(e.to_string());
        let mut tx = self.pool.begin().await.map_err(write)?;
        let mut updated = Vec::with_capacity(concepts.len());

        for concept in concepts {
            let row = sqlx::query(
                r#"
                INSERT INTO weaknesses (owner, concept, frequency, last_incorrect_at)
                VALUES (?, ?, 1, ?)
                ON CONFLICT(owner, concept) DO UPDATE SET
                    frequency = frequency + 1,
                    last_incorrect_at = excluded.last_incorrect_at
                RETURNING owner, concept, frequency, last_incorrect_at
                "#,
            )
            .bind(owner.as_str())
            .bind(concept)
            .bind(at.to_rfc3339_opts(SecondsFormat::Nanos, true))
            .fetch_one(&mut *tx)
            .await
            .map_err(write)?;
            updated.push(to_record(&row)?);
        }

        tx.commit().await.map_err(write)?;
        Ok(updated)
    }

    async fn get(
        &self,
        owner: &OwnerId,
        concept: &str,
    ) -> Result<Option<WeaknessRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT owner, concept, frequency, last_incorrect_at FROM weaknesses WHERE owner = ? AND concept = ?",
        )
        .bind(owner.as_str())
        .bind(concept)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        row.as_ref().map(to_record).transpose()
    }

    async fn top(&self, owner: &OwnerId, limit: usize) -> Result<Vec<WeaknessRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT owner, concept, frequency, last_incorrect_at
            FROM weaknesses
            WHERE owner = ?
            ORDER BY frequency DESC, concept ASC
            LIMIT ?
            "#,
        )
        .bind(owner.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.iter().map(to_record).collect()
    }

    async fn count(&self, owner: &OwnerId) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weaknesses WHERE owner = ?")
            .bind(owner.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(count as usize)
    }
}
