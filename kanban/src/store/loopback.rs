//! In-process task store for testing.
//!
//! [`LoopbackStore`] keeps the authoritative collection in memory and
//! follows the task store's rules (append on create, dense columns after
//! every move). Tests can inject failures, pause responses per operation,
//! and rewrite the server-side state underneath a board.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use kanban_proto::{NewTask, ReorderRequest, Status, Task, TaskId, TaskPatch};
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{StoreError, TaskStoreClient};
use crate::board::engine::plan_reorder;

/// A store operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list`
    List,
    /// `get`
    Get,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
    /// `reorder`
    Reorder,
}

/// In-memory [`TaskStoreClient`].
pub struct LoopbackStore {
    tasks: Mutex<Vec<Task>>,
    failures: Mutex<HashSet<Operation>>,
    calls: Mutex<HashMap<Operation, usize>>,
    /// Operations whose responses are held back.
    held: watch::Sender<HashSet<Operation>>,
}

impl LoopbackStore {
    /// Creates a store holding `tasks` as given.
    #[must_use]
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            failures: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            held: watch::Sender::new(HashSet::new()),
        }
    }

    /// The server-side collection.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    /// Replaces the server-side collection.
    pub fn set_tasks(&self, tasks: Vec<Task>) {
        *self.tasks.lock() = tasks;
    }

    /// Makes the next call of `operation` fail with a 500.
    pub fn fail_next(&self, operation: Operation) {
        self.failures.lock().insert(operation);
    }

    /// Number of `operation` requests received.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls.lock().get(&operation).copied().unwrap_or(0)
    }

    /// Holds `operation` responses until [`release`](Self::release).
    ///
    /// Requests are still counted and applied; only the reply waits.
    pub fn hold(&self, operation: Operation) {
        self.held.send_modify(|held| {
            held.insert(operation);
        });
    }

    /// Lets held `operation` responses through.
    pub fn release(&self, operation: Operation) {
        self.held.send_modify(|held| {
            held.remove(&operation);
        });
    }

    /// Counts the request, then hands back `result` once `operation` is not held.
    async fn respond<T>(&self, operation: Operation, result: T) -> T {
        *self.calls.lock().entry(operation).or_default() += 1;
        let mut held = self.held.subscribe();
        // The sender lives in `self`, so this only errors if the store is gone.
        let _ = held.wait_for(|held| !held.contains(&operation)).await;
        result
    }

    fn check_failure(&self, operation: Operation, code: &str) -> Result<(), StoreError> {
        if self.failures.lock().remove(&operation) {
            tracing::debug!(?operation, "injected store failure");
            return Err(StoreError::Status {
                status: 500,
                code: code.to_string(),
            });
        }
        Ok(())
    }

    fn apply_create(&self, task: NewTask) -> Result<Task, StoreError> {
        self.check_failure(Operation::Create, "create_failed")?;
        let task = task.validated().map_err(|e| Self::invalid(e.code()))?;
        let status = task.status.unwrap_or_default();
        let now = Utc::now();

        let mut tasks = self.tasks.lock();
        let created = Task {
            id: TaskId::generate(),
            title: task.title,
            description: task.description,
            status,
            order: next_order(&tasks, status),
            created_at: now,
            updated_at: now,
        };
        tasks.push(created.clone());
        Ok(created)
    }

    fn apply_update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        self.check_failure(Operation::Update, "update_failed")?;
        let patch = patch.validated().map_err(|e| Self::invalid(e.code()))?;

        let mut tasks = self.tasks.lock();
        let pos = tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(Self::not_found)?;
        let old_status = tasks[pos].status;
        let new_order = patch
            .status
            .filter(|s| *s != old_status)
            .map(|s| next_order(&tasks, s));

        let task = &mut tasks[pos];
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description).filter(|d| !d.is_empty());
        }
        if let (Some(status), Some(order)) = (patch.status, new_order) {
            task.status = status;
            task.order = order;
        }
        task.updated_at = Utc::now();
        let updated = task.clone();

        if new_order.is_some() {
            densify(&mut tasks, old_status);
        }
        Ok(updated)
    }

    fn apply_delete(&self, id: &TaskId) -> Result<(), StoreError> {
        self.check_failure(Operation::Delete, "delete_failed")?;
        let mut tasks = self.tasks.lock();
        let pos = tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(Self::not_found)?;
        let removed = tasks.remove(pos);
        densify(&mut tasks, removed.status);
        Ok(())
    }

    fn apply_reorder(&self, id: &TaskId, request: ReorderRequest) -> Result<Task, StoreError> {
        self.check_failure(Operation::Reorder, "reorder_failed")?;
        let mut tasks = self.tasks.lock();
        let plan =
            plan_reorder(&tasks, id, request.status, request.index).ok_or_else(Self::not_found)?;
        *tasks = plan.tasks;
        let moved = tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(Self::not_found)?;
        moved.updated_at = Utc::now();
        Ok(moved.clone())
    }

    fn not_found() -> StoreError {
        StoreError::Status {
            status: 404,
            code: "not_found".to_string(),
        }
    }

    fn invalid(code: &str) -> StoreError {
        StoreError::Status {
            status: 400,
            code: code.to_string(),
        }
    }
}

/// Next append position in `status`.
fn next_order(tasks: &[Task], status: Status) -> u32 {
    tasks
        .iter()
        .filter(|t| t.status == status)
        .map(|t| t.order)
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

/// Renumbers `status` densely, preserving display order.
fn densify(tasks: &mut [Task], status: Status) {
    let mut column: Vec<&mut Task> = tasks.iter_mut().filter(|t| t.status == status).collect();
    column.sort_by(|a, b| a.display_cmp(b));
    for (position, task) in column.into_iter().enumerate() {
        task.order = u32::try_from(position + 1).unwrap_or(u32::MAX);
    }
}

impl TaskStoreClient for LoopbackStore {
    async fn list(&self, status: Option<Status>) -> Result<Vec<Task>, StoreError> {
        let result = self.check_failure(Operation::List, "list_failed").map(|()| {
            self.tasks
                .lock()
                .iter()
                .filter(|t| status.is_none_or(|s| t.status == s))
                .cloned()
                .collect::<Vec<_>>()
        });
        self.respond(Operation::List, result).await
    }

    async fn get(&self, id: &TaskId) -> Result<Task, StoreError> {
        let result = self.check_failure(Operation::Get, "get_failed").and_then(|()| {
            self.tasks
                .lock()
                .iter()
                .find(|t| &t.id == id)
                .cloned()
                .ok_or_else(Self::not_found)
        });
        self.respond(Operation::Get, result).await
    }

    async fn create(&self, task: NewTask) -> Result<Task, StoreError> {
        let result = self.apply_create(task);
        self.respond(Operation::Create, result).await
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        let result = self.apply_update(id, patch);
        self.respond(Operation::Update, result).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        let result = self.apply_delete(id);
        self.respond(Operation::Delete, result).await
    }

    async fn reorder(&self, id: &TaskId, request: ReorderRequest) -> Result<Task, StoreError> {
        let result = self.apply_reorder(id, request);
        self.respond(Operation::Reorder, result).await
    }
}
