//! Ordered delivery of optimistic mutations to a gateway.
//!
//! # Responsibility
//! - Carry every gateway write as a [`PendingMutation`] through one FIFO
//!   channel per list, so writes reach storage in mutation order.
//! - Translate locally assigned ids once the gateway has assigned its own.
//!
//! # Invariants
//! - A failed write is logged and dropped; the in-memory state it came from
//!   is never rolled back and nothing is retried.
//! - The worker stops when the owning store is dropped.

use crate::gateway::{GatewayResult, TaskGateway};
use crate::model::list::ListScope;
use crate::model::task::{Task, TaskId, TaskPatch};
use log::{debug, error};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

/// One optimistic write that has been applied in memory but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingMutation {
    Insert { task: Task },
    Update { id: TaskId, patch: TaskPatch },
    Delete { id: TaskId },
    SaveAll { tasks: Vec<Task> },
}

impl PendingMutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::SaveAll { .. } => "save_all",
        }
    }
}

/// Receives gateway-assigned identity for inserted tasks.
pub(crate) trait InsertReconciler: Send + Sync {
    fn reconcile_insert(&self, local_id: &TaskId, stored: &Task);
}

enum Command {
    Apply(PendingMutation),
    Flush(oneshot::Sender<()>),
}

/// Sending half of one list's mutation worker.
#[derive(Clone)]
pub(crate) struct PendingQueue {
    tx: mpsc::UnboundedSender<Command>,
}

impl PendingQueue {
    pub(crate) fn spawn(
        runtime: &Handle,
        gateway: Arc<dyn TaskGateway>,
        scope: ListScope,
        reconciler: Weak<dyn InsertReconciler>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            gateway,
            scope,
            reconciler,
            remapped: HashMap::new(),
        };
        runtime.spawn(worker.run(rx));
        Self { tx }
    }

    pub(crate) fn submit(&self, mutation: PendingMutation) {
        let kind = mutation.kind();
        if self.tx.send(Command::Apply(mutation)).is_err() {
            error!(
                "event=mutation_submit module=store status=error error_code=worker_stopped kind={kind}"
            );
        }
    }

    /// Resolves once every mutation submitted before this call was attempted.
    pub(crate) async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

struct Worker {
    gateway: Arc<dyn TaskGateway>,
    scope: ListScope,
    reconciler: Weak<dyn InsertReconciler>,
    /// Local id -> gateway id, for tasks whose insert returned a new id.
    remapped: HashMap<TaskId, TaskId>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Apply(mutation) => self.apply(mutation).await,
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!(
            "event=mutation_worker module=store status=stopped list_id={}",
            self.scope.list_id
        );
    }

    async fn apply(&mut self, mutation: PendingMutation) {
        let started_at = Instant::now();
        let kind = mutation.kind();
        let result = self.dispatch(mutation).await;
        match result {
            Ok(()) => debug!(
                "event=mutation_apply module=store status=ok list_id={} kind={} duration_ms={}",
                self.scope.list_id,
                kind,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=mutation_apply module=store status=error list_id={} kind={} duration_ms={} error_code={} error={}",
                self.scope.list_id,
                kind,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
    }

    async fn dispatch(&mut self, mutation: PendingMutation) -> GatewayResult<()> {
        match mutation {
            PendingMutation::Insert { task } => {
                let stored = self.gateway.insert_task(&self.scope, &task).await?;
                if stored.id != task.id || stored.created_at != task.created_at {
                    if stored.id != task.id {
                        self.remapped.insert(task.id.clone(), stored.id.clone());
                    }
                    if let Some(reconciler) = self.reconciler.upgrade() {
                        reconciler.reconcile_insert(&task.id, &stored);
                    }
                }
                Ok(())
            }
            PendingMutation::Update { id, patch } => {
                let id = self.translate(id);
                self.gateway.update_task(&self.scope, &id, &patch).await
            }
            PendingMutation::Delete { id } => {
                let id = self.translate(id);
                self.remapped.retain(|_, remote| *remote != id);
                self.gateway.delete_task(&self.scope, &id).await
            }
            PendingMutation::SaveAll { mut tasks } => {
                for task in &mut tasks {
                    task.id = self.translate(task.id.clone());
                }
                self.gateway.save_all(&self.scope, &tasks).await
            }
        }
    }

    fn translate(&self, id: TaskId) -> TaskId {
        self.remapped.get(&id).cloned().unwrap_or(id)
    }
}
