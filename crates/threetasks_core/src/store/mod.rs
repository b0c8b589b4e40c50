//! Task store core: the authoritative in-memory task list of one named list.
//!
//! # Responsibility
//! - Apply add/toggle/delete optimistically and publish snapshots right away.
//! - Stamp completion times according to [`ListPolicy`].
//! - Keep the canonical order or run delayed removals, per policy.
//! - Forward every mutation to the gateway through the pending queue.
//!
//! # Invariants
//! - Gateway failures never reach callers; they are logged and the in-memory
//!   state stays as the caller left it.
//! - At most one pending removal exists per task id; a newer toggle or a
//!   delete cancels it.
//! - Without a user id every operation is skipped.
//! - Snapshot-mode writes issued before `load` completes are held back and
//!   written once, merged with the loaded tasks.

use crate::clock::Clock;
use crate::gateway::{PersistenceMode, TaskGateway};
use crate::identity::IdentitySource;
use crate::model::list::{ListId, ListScope};
use crate::model::task::{due_date_completion_instant, Task, TaskId, TaskPatch};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub mod pending;
pub mod policy;
pub mod sort;

use pending::{InsertReconciler, PendingMutation, PendingQueue};
pub use policy::{ListPolicy, COMPLETION_GRACE_DELAY};
use sort::canonical_sort;

/// Immutable view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListSnapshot {
    pub tasks: Vec<Task>,
    pub loading: bool,
}

/// Handle to one list's task state. Cheap to clone.
///
/// Mutating calls never wait on storage. They need a Tokio runtime only for
/// the work they schedule, and use the runtime the store was opened on.
#[derive(Clone)]
pub struct TaskStore {
    core: Arc<ListCore>,
}

struct ListCore {
    list_id: ListId,
    /// `None` when no user id could be obtained.
    scope: Option<ListScope>,
    policy: ListPolicy,
    mode: PersistenceMode,
    gateway: Arc<dyn TaskGateway>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    queue: Option<PendingQueue>,
    state: Mutex<ListState>,
    snapshot_tx: watch::Sender<TaskListSnapshot>,
}

struct PendingRemoval {
    ticket: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct ListState {
    tasks: Vec<Task>,
    loading: bool,
    /// Snapshot-mode write skipped while loading.
    deferred_save: bool,
    /// Tasks added while loading; they survive the load merge.
    added_while_loading: HashSet<TaskId>,
    /// Tasks toggled or removed while loading; their in-memory state wins
    /// over the fetched copy.
    touched_while_loading: HashSet<TaskId>,
    removals: HashMap<TaskId, PendingRemoval>,
    next_ticket: u64,
    /// Local id -> gateway id for reconciled inserts.
    aliases: HashMap<TaskId, TaskId>,
}

impl ListState {
    fn resolve(&self, id: &TaskId) -> TaskId {
        self.aliases.get(id).cloned().unwrap_or_else(|| id.clone())
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| &task.id == id)
    }

    fn touch(&mut self, id: &TaskId) {
        if self.loading {
            self.touched_while_loading.insert(id.clone());
        }
    }

    /// Drops alias entries pointing at `id` once the task is gone.
    fn forget_aliases(&mut self, id: &TaskId) {
        self.aliases.retain(|_, target| target != id);
    }

    fn cancel_removal(&mut self, id: &TaskId) -> bool {
        match self.removals.remove(id) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> TaskListSnapshot {
        TaskListSnapshot {
            tasks: self.tasks.clone(),
            loading: self.loading,
        }
    }
}

impl TaskStore {
    /// Opens the store for `list_id`, resolving the user id once.
    ///
    /// The returned store starts empty with `loading == true`; call
    /// [`TaskStore::load`] to fetch persisted tasks.
    pub async fn open(
        identity: &dyn IdentitySource,
        gateway: Arc<dyn TaskGateway>,
        list_id: ListId,
        policy: ListPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scope = match identity.user_id().await {
            Ok(user_id) => Some(ListScope::new(user_id, list_id.clone())),
            Err(err) => {
                error!(
                    "event=store_open module=store status=error list_id={} error_code=identity_missing error={}",
                    list_id, err
                );
                None
            }
        };

        let runtime = Handle::current();
        let mode = gateway.mode();
        let (snapshot_tx, _) = watch::channel(TaskListSnapshot {
            tasks: Vec::new(),
            loading: true,
        });

        let core = Arc::new_cyclic(|weak: &Weak<ListCore>| {
            let reconciler: Weak<dyn InsertReconciler> = weak.clone();
            let queue = scope.as_ref().map(|scope| {
                PendingQueue::spawn(&runtime, Arc::clone(&gateway), scope.clone(), reconciler)
            });
            ListCore {
                list_id,
                scope,
                policy,
                mode,
                gateway,
                clock,
                runtime: runtime.clone(),
                queue,
                state: Mutex::new(ListState {
                    loading: true,
                    ..ListState::default()
                }),
                snapshot_tx,
            }
        });

        info!(
            "event=store_open module=store status=ok list_id={} attached={} delete_on_complete={} prepend={} due_date_completion={}",
            core.list_id,
            core.scope.is_some(),
            policy.delete_on_complete,
            policy.prepend,
            policy.use_due_date_as_completion_date
        );
        Self { core }
    }

    pub fn list_id(&self) -> &ListId {
        &self.core.list_id
    }

    pub fn policy(&self) -> ListPolicy {
        self.core.policy
    }

    /// Whether a user id was available when the store was opened.
    pub fn is_attached(&self) -> bool {
        self.core.scope.is_some()
    }

    /// Current tasks in display order plus the loading flag.
    pub fn snapshot(&self) -> TaskListSnapshot {
        self.core.snapshot_tx.borrow().clone()
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<TaskListSnapshot> {
        self.core.snapshot_tx.subscribe()
    }

    /// Fetches persisted tasks and replaces the in-memory list with them.
    ///
    /// Tasks added before the fetch finished are kept. A storage failure
    /// loads an empty list.
    pub async fn load(&self) {
        self.core.load().await;
    }

    /// Adds a task; blank `text` is ignored.
    ///
    /// Returns the id assigned in memory. Relational backends may later
    /// replace it; the old id keeps working for `toggle` and `delete`.
    pub fn add(&self, text: &str, due_date: Option<NaiveDate>) -> Option<TaskId> {
        self.core.add(text, due_date)
    }

    /// Flips completion of `id`. Returns false when the id is unknown.
    pub fn toggle(&self, id: &TaskId) -> bool {
        self.core.toggle(id)
    }

    /// Removes `id`. Returns false when the id is unknown.
    pub fn delete(&self, id: &TaskId) -> bool {
        self.core.delete(id)
    }

    /// Waits until every mutation issued so far has been attempted.
    pub async fn flush(&self) {
        if let Some(queue) = &self.core.queue {
            queue.flush().await;
        }
    }
}

impl ListCore {
    fn lock(&self) -> MutexGuard<'_, ListState> {
        // State is only mutated in whole steps; a poisoned guard is still coherent.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publishes `state` and queues `mutation`; called with the lock held so
    /// queue order always matches state order.
    fn commit(&self, state: &ListState, mutation: Option<PendingMutation>) {
        self.snapshot_tx.send_replace(state.snapshot());
        if let (Some(queue), Some(mutation)) = (self.queue.as_ref(), mutation) {
            queue.submit(mutation);
        }
    }

    fn ensure_attached(&self, operation: &'static str) -> bool {
        if self.queue.is_none() {
            warn!(
                "event=task_{} module=store status=skipped list_id={} error_code=identity_missing",
                operation, self.list_id
            );
            return false;
        }
        true
    }

    /// Mutation persisting the whole list, or `None` while a load is running.
    fn save_all_or_defer(&self, state: &mut ListState) -> Option<PendingMutation> {
        if state.loading {
            state.deferred_save = true;
            return None;
        }
        Some(PendingMutation::SaveAll {
            tasks: state.tasks.clone(),
        })
    }

    fn removal_mutation(&self, state: &mut ListState, id: &TaskId) -> Option<PendingMutation> {
        match self.mode {
            PersistenceMode::PerRecord => Some(PendingMutation::Delete { id: id.clone() }),
            PersistenceMode::Snapshot => self.save_all_or_defer(state),
        }
    }

    fn completion_instant(&self, task: &Task) -> DateTime<Utc> {
        match task.due_date {
            Some(due) if self.policy.use_due_date_as_completion_date => {
                due_date_completion_instant(due)
            }
            _ => self.clock.now(),
        }
    }

    async fn load(&self) {
        let Some(scope) = self.scope.as_ref() else {
            self.ensure_attached("load");
            let mut state = self.lock();
            state.loading = false;
            self.commit(&state, None);
            return;
        };

        {
            let mut state = self.lock();
            state.loading = true;
            self.commit(&state, None);
        }
        // Writes issued before this load must be visible to the fetch.
        if let Some(queue) = &self.queue {
            queue.flush().await;
        }

        let fetched = match self.gateway.list_tasks(scope).await {
            Ok(tasks) => tasks,
            Err(err) => {
                error!(
                    "event=task_load module=store status=error list_id={} error_code={} error={}",
                    self.list_id,
                    err.code(),
                    err
                );
                Vec::new()
            }
        };

        let mut state = self.lock();
        let mut fetched: Vec<Task> = fetched.into_iter().filter(Task::is_active).collect();
        if self.mode == PersistenceMode::PerRecord && self.policy.prepend {
            // Relational rows arrive oldest first.
            fetched.reverse();
        }

        let fetched_ids: HashSet<TaskId> = fetched.iter().map(|task| task.id.clone()).collect();
        let added = std::mem::take(&mut state.added_while_loading);
        let touched = std::mem::take(&mut state.touched_while_loading);
        let previous = std::mem::take(&mut state.tasks);
        let mut tasks: Vec<Task> = fetched
            .into_iter()
            .filter_map(|task| {
                if !touched.contains(&task.id) {
                    return Some(task);
                }
                // Absent from memory means removed while loading.
                previous.iter().find(|local| local.id == task.id).cloned()
            })
            .collect();
        let local: Vec<Task> = previous
            .into_iter()
            .filter(|task| added.contains(&task.id) && !fetched_ids.contains(&task.id))
            .collect();
        let kept_local = local.len();
        if self.policy.prepend {
            tasks.splice(0..0, local);
        } else {
            tasks.extend(local);
        }
        canonical_sort(&mut tasks);

        state.tasks = tasks;
        state.loading = false;
        let mutation = if self.mode == PersistenceMode::Snapshot && state.deferred_save {
            state.deferred_save = false;
            self.save_all_or_defer(&mut state)
        } else {
            None
        };
        info!(
            "event=task_load module=store status=ok list_id={} task_count={} kept_local={} deferred_write={}",
            self.list_id,
            state.tasks.len(),
            kept_local,
            mutation.is_some()
        );
        self.commit(&state, mutation);
    }

    fn add(&self, text: &str, due_date: Option<NaiveDate>) -> Option<TaskId> {
        let text = text.trim();
        if text.is_empty() {
            debug!(
                "event=task_add module=store status=skipped list_id={} reason=blank_text",
                self.list_id
            );
            return None;
        }
        if !self.ensure_attached("add") {
            return None;
        }

        let task = Task::new(TaskId::generate(), text, self.clock.now(), due_date);
        let id = task.id.clone();

        let mut state = self.lock();
        if self.policy.prepend {
            state.tasks.insert(0, task.clone());
        } else {
            state.tasks.push(task.clone());
        }
        if self.policy.keeps_sorted() {
            canonical_sort(&mut state.tasks);
        }
        if state.loading {
            state.added_while_loading.insert(id.clone());
        }

        let mutation = match self.mode {
            PersistenceMode::PerRecord => Some(PendingMutation::Insert { task }),
            PersistenceMode::Snapshot => self.save_all_or_defer(&mut state),
        };
        self.commit(&state, mutation);
        info!(
            "event=task_add module=store status=ok list_id={} task_id={} has_due_date={}",
            self.list_id,
            id,
            due_date.is_some()
        );
        Some(id)
    }

    fn toggle(self: &Arc<Self>, id: &TaskId) -> bool {
        if !self.ensure_attached("toggle") {
            return false;
        }

        let mut state = self.lock();
        let id = state.resolve(id);
        let Some(index) = state.position(&id) else {
            debug!(
                "event=task_toggle module=store status=skipped list_id={} task_id={} reason=unknown_id",
                self.list_id, id
            );
            return false;
        };

        state.touch(&id);
        let completed_at = (!state.tasks[index].completed)
            .then(|| self.completion_instant(&state.tasks[index]));
        let task = &mut state.tasks[index];
        match completed_at {
            Some(at) => task.mark_completed(at),
            None => task.mark_uncompleted(),
        }
        let completed = task.completed;
        let patch = TaskPatch::completion_of(task);

        if state.cancel_removal(&id) {
            debug!(
                "event=task_removal module=store status=cancelled list_id={} task_id={}",
                self.list_id, id
            );
        }
        if self.policy.delete_on_complete {
            if completed {
                self.schedule_removal(&mut state, id.clone());
            }
        } else {
            canonical_sort(&mut state.tasks);
        }

        let mutation = match self.mode {
            PersistenceMode::PerRecord => Some(PendingMutation::Update {
                id: id.clone(),
                patch,
            }),
            PersistenceMode::Snapshot => self.save_all_or_defer(&mut state),
        };
        self.commit(&state, mutation);
        info!(
            "event=task_toggle module=store status=ok list_id={} task_id={} completed={}",
            self.list_id, id, completed
        );
        true
    }

    fn delete(&self, id: &TaskId) -> bool {
        if !self.ensure_attached("delete") {
            return false;
        }

        let mut state = self.lock();
        let id = state.resolve(id);
        let Some(index) = state.position(&id) else {
            debug!(
                "event=task_delete module=store status=skipped list_id={} task_id={} reason=unknown_id",
                self.list_id, id
            );
            return false;
        };
        state.tasks.remove(index);
        state.cancel_removal(&id);
        state.added_while_loading.remove(&id);
        state.touch(&id);

        let mutation = self.removal_mutation(&mut state, &id);
        self.commit(&state, mutation);
        state.forget_aliases(&id);
        info!(
            "event=task_delete module=store status=ok list_id={} task_id={}",
            self.list_id, id
        );
        true
    }

    /// Schedules removal of a just-completed task after the grace delay.
    ///
    /// Runs with the state lock held, so the timer cannot fire before its
    /// entry is registered.
    fn schedule_removal(self: &Arc<Self>, state: &mut ListState, id: TaskId) {
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        let core = Arc::clone(self);
        let timer_id = id.clone();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(COMPLETION_GRACE_DELAY).await;
            core.finish_removal(&timer_id, ticket);
        });
        state.removals.insert(id, PendingRemoval { ticket, handle });
    }

    /// Ends a grace window: removes the task if this removal is still current.
    fn finish_removal(&self, id: &TaskId, ticket: u64) {
        let mut state = self.lock();
        let id = state.resolve(id);
        let current = state.removals.get(&id).map(|pending| pending.ticket) == Some(ticket);
        if !current {
            return;
        }
        state.removals.remove(&id);
        let Some(index) = state
            .tasks
            .iter()
            .position(|task| task.id == id && task.completed)
        else {
            return;
        };
        state.tasks.remove(index);
        state.added_while_loading.remove(&id);
        state.touch(&id);

        let mutation = self.removal_mutation(&mut state, &id);
        self.commit(&state, mutation);
        state.forget_aliases(&id);
        info!(
            "event=task_remove_completed module=store status=ok list_id={} task_id={}",
            self.list_id, id
        );
    }
}

impl InsertReconciler for ListCore {
    fn reconcile_insert(&self, local_id: &TaskId, stored: &Task) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(index) = state.position(local_id) else {
            // Deleted before the insert was confirmed.
            return;
        };

        let mut task = state.tasks.remove(index);
        task.id = stored.id.clone();
        task.created_at = stored.created_at;
        if stored.id != *local_id {
            state.aliases.insert(local_id.clone(), stored.id.clone());
            for ids in [&mut state.added_while_loading, &mut state.touched_while_loading] {
                if ids.remove(local_id) {
                    ids.insert(stored.id.clone());
                }
            }
            if let Some(pending) = state.removals.remove(local_id) {
                state.removals.insert(stored.id.clone(), pending);
            }
        }
        match state.position(&stored.id) {
            // A load already brought in the stored copy; in-memory edits win.
            Some(loaded) => state.tasks[loaded] = task,
            None => state.tasks.insert(index, task),
        }
        self.commit(state, None);
        debug!(
            "event=task_reconcile module=store status=ok list_id={} local_id={} task_id={}",
            self.list_id, local_id, stored.id
        );
    }
}
