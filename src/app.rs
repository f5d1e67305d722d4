//! Wires configuration, SQLite storage, and the embedding provider into
//! a ready [`RagEngine`] and [`WeaknessAggregator`].

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

use coursemaster_core::engine::RagEngine;
use coursemaster_core::weakness::WeaknessAggregator;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::migrate;
use crate::sqlite_store::SqliteStore;
use crate::sqlite_weakness::SqliteWeaknessStore;

/// Process-wide services, constructed once per command or server.
pub struct App {
    pub engine: Arc<RagEngine>,
    pub weaknesses: Arc<WeaknessAggregator>,
    pool: SqlitePool,
}

impl App {
    /// Open the database (applying the schema if needed) and build the
    /// engine from `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config)
            .await
            .with_context(|| format!("Failed to open store at {}", config.store.path.display()))?;
        migrate::apply(&pool).await?;

        let embedder = create_embedder(&config.embedding)?;
        debug!(
            provider = %config.embedding.provider,
            model = embedder.model_name(),
            dims = embedder.dims(),
            "embedding provider ready"
        );

        let store = Arc::new(SqliteStore::new(pool.clone()));
        let engine = RagEngine::new(embedder, store, config.engine_settings())?;
        let weaknesses = WeaknessAggregator::new(Arc::new(SqliteWeaknessStore::new(pool.clone())));

        Ok(Self {
            engine: Arc::new(engine),
            weaknesses: Arc::new(weaknesses),
            pool,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
