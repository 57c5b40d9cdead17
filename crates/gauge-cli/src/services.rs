//! Wiring of the storage handle and pipeline services for one invocation.

use std::sync::Arc;

use anyhow::{Context, Result};
use gauge_db::Database;
use gauge_pipeline::{CylinderRegistry, IngestionService, SharedDatabase};

use crate::Config;

/// Services shared by the subcommands.
pub struct Services {
    pub db: SharedDatabase,
    pub registry: Arc<CylinderRegistry>,
    pub ingestion: Arc<IngestionService>,
}

impl Services {
    /// Opens the configured database, creating its directory if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }
        let db = Database::open(&config.database_path)
            .with_context(|| format!("failed to open {}", config.database_path.display()))?;
        Self::from_database(db, config).await
    }

    pub async fn from_database(db: Database, config: &Config) -> Result<Self> {
        let db = gauge_pipeline::share(db);
        let registry = CylinderRegistry::load(db.clone())
            .await
            .context("failed to load the active cylinder")?;
        let registry = Arc::new(registry);
        let ingestion = Arc::new(IngestionService::new(
            db.clone(),
            Arc::clone(&registry),
            config.outlier,
        ));
        Ok(Self {
            db,
            registry,
            ingestion,
        })
    }
}
