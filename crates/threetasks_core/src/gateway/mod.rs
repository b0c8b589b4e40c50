//! Persistence gateway contracts.
//!
//! # Responsibility
//! - Define one async contract over "store of task records" so the task store
//!   does not care whether it talks to a local blob or a relational table.
//! - Report semantic errors (`NotFound`, `InvalidData`) next to transport errors.
//!
//! # Invariants
//! - Every call is scoped by `(user_id, list_id)`.
//! - `list_tasks` never returns soft-deleted records.
//!
//! # See also
//! - `store::pending` for how mutations reach a gateway.

use crate::db::DbError;
use crate::kv::KvError;
use crate::model::list::ListScope;
use crate::model::task::{Task, TaskId, TaskPatch};
use async_trait::async_trait;
use thiserror::Error;

mod local_blob;
mod relational;

pub use local_blob::LocalBlobGateway;
pub use relational::SqliteTaskGateway;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("invalid persisted task data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl GatewayError {
    /// Short stable code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Kv(_) => "storage_unavailable",
            Self::Db(_) => "db_failure",
            Self::NotFound(_) => "task_not_found",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

/// How a backend wants to receive mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Whole list rewritten via `save_all` after every mutation.
    Snapshot,
    /// Individual `insert_task` / `update_task` / `delete_task` calls.
    PerRecord,
}

/// Store of task records keyed by `(user, list)`.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    fn mode(&self) -> PersistenceMode;

    /// Active tasks of `scope` in storage order.
    async fn list_tasks(&self, scope: &ListScope) -> GatewayResult<Vec<Task>>;

    /// Persists a new task and returns the stored record.
    ///
    /// Backends that own identity may replace `id` and `created_at`.
    async fn insert_task(&self, scope: &ListScope, task: &Task) -> GatewayResult<Task>;

    async fn update_task(
        &self,
        scope: &ListScope,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> GatewayResult<()>;

    /// Hard delete (local) or tombstone (relational).
    async fn delete_task(&self, scope: &ListScope, id: &TaskId) -> GatewayResult<()>;

    /// Replaces the whole stored list with `tasks`.
    async fn save_all(&self, scope: &ListScope, tasks: &[Task]) -> GatewayResult<()>;
}
