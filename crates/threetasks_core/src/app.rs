//! Composition root: config to database, identity, gateway and stores.
//!
//! # Responsibility
//! - Open the SQLite file under `data_dir` and build the shared services.
//! - Hand out one [`TaskStore`] per configured list.
//!
//! # Invariants
//! - Every store opened from one app shares the database, identity and clock.
//! - Only lists named in the config can be opened.

use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, ConfigError, ListConfig, PersistenceBackend};
use crate::db::{Database, DbError};
use crate::gateway::{LocalBlobGateway, SqliteTaskGateway, TaskGateway};
use crate::identity::DeviceIdentity;
use crate::kv::{KeyValueStore, SqliteKeyValueStore};
use crate::model::list::ListId;
use crate::store::TaskStore;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to create data directory `{path}`: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("list `{0}` is not configured")]
    UnknownList(String),
}

pub struct TaskApp {
    config: AppConfig,
    identity: DeviceIdentity,
    gateway: Arc<dyn TaskGateway>,
    clock: Arc<dyn Clock>,
}

impl TaskApp {
    /// Opens `<data_dir>/threetasks.sqlite3`, creating the directory if needed.
    pub fn open(config: AppConfig) -> Result<Self, AppError> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir).map_err(|source| AppError::DataDir {
            path: config.data_dir.clone(),
            source,
        })?;
        let db = Database::open(config.database_path())?;
        Ok(Self::assemble(config, db, Arc::new(SystemClock)))
    }

    /// Same wiring over a private in-memory database.
    pub fn open_in_memory(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        config.validate()?;
        let db = Database::open_in_memory()?;
        Ok(Self::assemble(config, db, clock))
    }

    fn assemble(config: AppConfig, db: Database, clock: Arc<dyn Clock>) -> Self {
        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(db.clone()));
        let gateway: Arc<dyn TaskGateway> = match config.persistence.backend {
            PersistenceBackend::Local => Arc::new(LocalBlobGateway::new(Arc::clone(&kv))),
            PersistenceBackend::Relational => {
                Arc::new(SqliteTaskGateway::new(db, Arc::clone(&clock)))
            }
        };
        info!(
            "event=app_open module=app status=ok backend={:?} list_count={}",
            config.persistence.backend,
            config.lists.len()
        );
        Self {
            identity: DeviceIdentity::new(kv),
            config,
            gateway,
            clock,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn lists(&self) -> &[ListConfig] {
        &self.config.lists
    }

    /// Opens and loads the store of a configured list.
    pub async fn open_list(&self, list_id: &str) -> Result<TaskStore, AppError> {
        let started_at = Instant::now();
        let list = self
            .config
            .list(list_id)
            .ok_or_else(|| AppError::UnknownList(list_id.to_string()))?;
        let id = ListId::parse(list.id.as_str())
            .map_err(|_| ConfigError::InvalidListId(list.id.clone()))?;

        let store = TaskStore::open(
            &self.identity,
            Arc::clone(&self.gateway),
            id,
            list.policy,
            Arc::clone(&self.clock),
        )
        .await;
        store.load().await;
        info!(
            "event=list_open module=app status=ok list_id={} duration_ms={}",
            list_id,
            started_at.elapsed().as_millis()
        );
        Ok(store)
    }
}
