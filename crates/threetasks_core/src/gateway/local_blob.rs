//! Single-blob local backend.
//!
//! Each list lives as one JSON array under `ListScope::storage_key()`. There
//! is no cache: every write serializes the full list and replaces the stored
//! value.

use super::{GatewayError, GatewayResult, PersistenceMode, TaskGateway};
use crate::kv::KeyValueStore;
use crate::model::list::ListScope;
use crate::model::task::{Task, TaskId, TaskPatch};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

#[derive(Clone)]
pub struct LocalBlobGateway {
    store: Arc<dyn KeyValueStore>,
}

impl LocalBlobGateway {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn read_all(&self, scope: &ListScope) -> GatewayResult<Vec<Task>> {
        let key = scope.storage_key();
        match self.store.get(&key)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|err| {
                GatewayError::InvalidData(format!("blob `{key}` is not a task array: {err}"))
            }),
            None => Ok(Vec::new()),
        }
    }

    fn write_all(&self, scope: &ListScope, tasks: &[Task]) -> GatewayResult<()> {
        let key = scope.storage_key();
        let raw = serde_json::to_string(tasks)
            .map_err(|err| GatewayError::InvalidData(format!("serialize `{key}`: {err}")))?;
        self.store.set(&key, &raw)?;
        debug!(
            "event=blob_write module=gateway status=ok list_id={} task_count={} bytes={}",
            scope.list_id,
            tasks.len(),
            raw.len()
        );
        Ok(())
    }
}

#[async_trait]
impl TaskGateway for LocalBlobGateway {
    fn mode(&self) -> PersistenceMode {
        PersistenceMode::Snapshot
    }

    async fn list_tasks(&self, scope: &ListScope) -> GatewayResult<Vec<Task>> {
        let mut tasks = self.read_all(scope)?;
        tasks.retain(Task::is_active);
        Ok(tasks)
    }

    async fn insert_task(&self, scope: &ListScope, task: &Task) -> GatewayResult<Task> {
        let mut tasks = self.read_all(scope)?;
        tasks.push(task.clone());
        self.write_all(scope, &tasks)?;
        Ok(task.clone())
    }

    async fn update_task(
        &self,
        scope: &ListScope,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> GatewayResult<()> {
        let mut tasks = self.read_all(scope)?;
        let task = tasks
            .iter_mut()
            .find(|task| &task.id == id && task.is_active())
            .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
        patch.apply_to(task);
        self.write_all(scope, &tasks)
    }

    async fn delete_task(&self, scope: &ListScope, id: &TaskId) -> GatewayResult<()> {
        let mut tasks = self.read_all(scope)?;
        let before = tasks.len();
        tasks.retain(|task| &task.id != id);
        if tasks.len() == before {
            return Err(GatewayError::NotFound(id.clone()));
        }
        self.write_all(scope, &tasks)
    }

    async fn save_all(&self, scope: &ListScope, tasks: &[Task]) -> GatewayResult<()> {
        self.write_all(scope, tasks)
    }
}
