//! Optimistic reorder engine.
//!
//! [`Board`] owns the flat task collection. A reorder is applied locally
//! first, then sent to the store; the store's answer either replaces the
//! local guess (followed by a full refresh) or, on failure, the collection
//! is restored to the snapshot taken before the move.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kanban_proto::{NewTask, ReorderRequest, Status, Task, TaskId, TaskPatch, ValidationError};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use super::resolver::{DragEnd, resolve};
use super::view::GroupedView;
use crate::store::{StoreError, TaskStoreClient};

/// Capacity of the board event channel.
const EVENT_BUFFER: usize = 64;

/// Errors returned by board operations.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// Input was rejected before any request was made.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The store call failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The task is not in the local collection.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// A reorder of this task has not settled yet.
    #[error("reorder of task {0} is still in flight")]
    ReorderInFlight(TaskId),

    /// The board was detached; the response was discarded.
    #[error("board detached")]
    Detached,
}

/// Notifications for a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// The collection changed; re-render.
    Changed,
    /// A non-fatal failure the user should see.
    Notice(String),
}

/// Result of simulating a reorder locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    /// The collection after the move.
    pub tasks: Vec<Task>,
    /// Destination index after clamping.
    pub index: usize,
}

/// Simulates moving `id` to `status` at `index`.
///
/// The index is clamped to the destination column's length, not counting
/// the moving task. Source and destination columns are renumbered `1..=N`
/// in display order. `updated_at` is left alone. Returns `None` if `id` is
/// not in `tasks`.
#[must_use]
pub fn plan_reorder(tasks: &[Task], id: &TaskId, status: Status, index: usize) -> Option<ReorderPlan> {
    let moving = tasks.iter().find(|t| &t.id == id)?;
    let source = moving.status;

    let view = GroupedView::build(tasks);
    let mut destination: Vec<TaskId> = view
        .column(status)
        .iter()
        .filter(|t| &t.id != id)
        .map(|t| t.id.clone())
        .collect();
    let index = index.min(destination.len());
    destination.insert(index, id.clone());

    let source_column: Vec<TaskId> = if source == status {
        Vec::new()
    } else {
        view.column(source)
            .iter()
            .filter(|t| &t.id != id)
            .map(|t| t.id.clone())
            .collect()
    };

    let mut tasks = tasks.to_vec();
    for (column, ids) in [(status, &destination), (source, &source_column)] {
        for (position, task_id) in ids.iter().enumerate() {
            if let Some(task) = tasks.iter_mut().find(|t| &t.id == task_id) {
                task.status = column;
                task.order = order_at(position);
            }
        }
    }

    Some(ReorderPlan { tasks, index })
}

fn order_at(position: usize) -> u32 {
    u32::try_from(position + 1).unwrap_or(u32::MAX)
}

/// Removes the in-flight mark when a reorder settles, however it settles.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<TaskId>>,
    id: TaskId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<TaskId>>, id: &TaskId) -> Option<Self> {
        set.lock().insert(id.clone()).then(|| Self {
            set,
            id: id.clone(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

/// Restores the pre-move snapshot unless the move is confirmed.
///
/// Covers both a rejected move and a reorder future dropped before the
/// store answered. A detached board is left as it is.
struct Rollback<'a, S: TaskStoreClient> {
    board: &'a Board<S>,
    snapshot: Option<Vec<Task>>,
}

impl<'a, S: TaskStoreClient> Rollback<'a, S> {
    fn new(board: &'a Board<S>, snapshot: Vec<Task>) -> Self {
        Self {
            board,
            snapshot: Some(snapshot),
        }
    }

    fn disarm(mut self) {
        self.snapshot = None;
    }
}

impl<S: TaskStoreClient> Drop for Rollback<'_, S> {
    fn drop(&mut self) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        if !self.board.is_attached() {
            return;
        }
        *self.board.tasks.write() = snapshot;
        self.board.publish(BoardEvent::Changed);
        tracing::debug!("optimistic reorder rolled back");
    }
}

/// Client-side board state: the flat task collection plus the store it
/// reconciles with.
///
/// Locks are never held across an `.await`; every mutation is a short
/// critical section between store calls.
pub struct Board<S: TaskStoreClient> {
    store: Arc<S>,
    tasks: RwLock<Vec<Task>>,
    in_flight: Mutex<HashSet<TaskId>>,
    attached: AtomicBool,
    events: broadcast::Sender<BoardEvent>,
}

impl<S: TaskStoreClient> Board<S> {
    /// Creates an empty board backed by `store`.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store,
            tasks: RwLock::new(Vec::new()),
            in_flight: Mutex::new(HashSet::new()),
            attached: AtomicBool::new(true),
            events,
        }
    }

    /// Subscribes to board events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// A copy of the flat collection.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.read().clone()
    }

    /// The grouped projection of the current collection.
    #[must_use]
    pub fn view(&self) -> GroupedView {
        GroupedView::build(&self.tasks.read())
    }

    /// A task from the local collection.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.tasks.read().iter().find(|t| &t.id == id).cloned()
    }

    /// Returns `true` until [`detach`](Self::detach) is called.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Stops the board from applying any further store responses.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
        tracing::debug!("board detached");
    }

    /// Replaces the collection with the store's full listing.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Store`] if the listing fails (the collection is
    /// left untouched) or [`BoardError::Detached`] if the board was detached
    /// while waiting.
    pub async fn refresh(&self) -> Result<(), BoardError> {
        let tasks = self.store.list(None).await?;
        self.ensure_attached()?;
        tracing::debug!(count = tasks.len(), "board refreshed");
        *self.tasks.write() = tasks;
        self.publish(BoardEvent::Changed);
        Ok(())
    }

    /// Moves a task optimistically, then confirms with the store.
    ///
    /// The local move is visible to readers before the store request is
    /// issued. On success the store's record replaces the local one and the
    /// board is refreshed; a failed refresh only raises a notice. On failure,
    /// or if this future is dropped before the store answers, the collection
    /// is restored to the snapshot taken before the move.
    ///
    /// # Errors
    ///
    /// - [`BoardError::TaskNotFound`] if `id` is not on the board.
    /// - [`BoardError::ReorderInFlight`] if a reorder of `id` has not settled.
    /// - [`BoardError::Store`] if the store rejected the move (rolled back).
    /// - [`BoardError::Detached`] if the board was detached.
    pub async fn reorder(&self, id: &TaskId, status: Status, index: usize) -> Result<Task, BoardError> {
        self.ensure_attached()?;
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, id) else {
            tracing::debug!(task_id = %id, "reorder rejected, previous move in flight");
            return Err(BoardError::ReorderInFlight(id.clone()));
        };

        let (snapshot, index) = {
            let mut tasks = self.tasks.write();
            let plan = plan_reorder(&tasks, id, status, index)
                .ok_or_else(|| BoardError::TaskNotFound(id.clone()))?;
            let snapshot = std::mem::replace(&mut *tasks, plan.tasks);
            (snapshot, plan.index)
        };
        let rollback = Rollback::new(self, snapshot);
        self.publish(BoardEvent::Changed);
        tracing::debug!(task_id = %id, status = %status, index, "optimistic reorder applied");

        let result = self
            .store
            .reorder(id, ReorderRequest { status, index })
            .await;
        if !self.is_attached() {
            tracing::debug!(task_id = %id, "discarding reorder response for detached board");
            return Err(BoardError::Detached);
        }

        match result {
            Ok(saved) => {
                rollback.disarm();
                self.fold(saved.clone());
                self.refresh_after(id, "Moved task").await?;
                Ok(saved)
            }
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "reorder failed, rolling back");
                drop(rollback);
                self.publish(BoardEvent::Notice(format!("Could not move task: {e}")));
                Err(e.into())
            }
        }
    }

    /// Resolves a finished drag and performs the resulting reorder.
    ///
    /// Returns `Ok(None)` when the drop resolves to nothing.
    ///
    /// # Errors
    ///
    /// Same as [`reorder`](Self::reorder).
    pub async fn handle_drag_end(&self, drag: &DragEnd) -> Result<Option<Task>, BoardError> {
        let Some(intent) = resolve(drag, &self.view()) else {
            tracing::debug!(task_id = %drag.active, "drop resolved to no-op");
            return Ok(None);
        };
        self.reorder(&intent.id, intent.status, intent.index)
            .await
            .map(Some)
    }

    /// Creates a task and adds the store's record to the board.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Validation`] without contacting the store, or
    /// [`BoardError::Store`] / [`BoardError::Detached`] as for
    /// [`refresh`](Self::refresh).
    pub async fn create(&self, task: NewTask) -> Result<Task, BoardError> {
        let task = task.validated()?;
        let created = self
            .store
            .create(task)
            .await
            .map_err(|e| self.store_failure("create", e))?;
        self.ensure_attached()?;
        self.fold(created.clone());
        tracing::info!(task_id = %created.id, "task created");
        Ok(created)
    }

    /// Updates a task and folds the store's record into the board.
    ///
    /// A status change also re-reads the board, since the store renumbers
    /// the column the task left. If that re-read fails the update stands and
    /// a notice is raised.
    ///
    /// # Errors
    ///
    /// As for [`create`](Self::create).
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, BoardError> {
        let patch = patch.validated()?;
        let moves = patch.status.is_some();
        let updated = self
            .store
            .update(id, patch)
            .await
            .map_err(|e| self.store_failure("update", e))?;
        self.ensure_attached()?;
        self.fold(updated.clone());
        if moves {
            self.refresh_after(id, "Updated task").await?;
        }
        tracing::info!(task_id = %id, "task updated");
        Ok(updated)
    }

    /// Deletes a task and removes it from the board.
    ///
    /// The remaining tasks of its column are renumbered the way the store
    /// renumbers them.
    ///
    /// # Errors
    ///
    /// As for [`refresh`](Self::refresh).
    pub async fn delete(&self, id: &TaskId) -> Result<(), BoardError> {
        self.store
            .delete(id)
            .await
            .map_err(|e| self.store_failure("delete", e))?;
        self.ensure_attached()?;
        {
            let mut tasks = self.tasks.write();
            if let Some(pos) = tasks.iter().position(|t| &t.id == id) {
                let removed = tasks.remove(pos);
                renumber(&mut tasks, removed.status);
            }
        }
        self.publish(BoardEvent::Changed);
        tracing::info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Re-reads the board after a confirmed change.
    ///
    /// A failed listing keeps the confirmed record and raises a notice;
    /// only [`BoardError::Detached`] is returned.
    async fn refresh_after(&self, id: &TaskId, done: &str) -> Result<(), BoardError> {
        match self.refresh().await {
            Err(BoardError::Detached) => Err(BoardError::Detached),
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "refresh after change failed");
                self.publish(BoardEvent::Notice(format!(
                    "{done}, but the board could not be refreshed: {e}"
                )));
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    fn ensure_attached(&self) -> Result<(), BoardError> {
        if self.is_attached() {
            Ok(())
        } else {
            Err(BoardError::Detached)
        }
    }

    /// Replaces (or inserts) a record from the store.
    fn fold(&self, task: Task) {
        {
            let mut tasks = self.tasks.write();
            match tasks.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task,
                None => tasks.push(task),
            }
        }
        self.publish(BoardEvent::Changed);
    }

    fn store_failure(&self, operation: &str, err: StoreError) -> BoardError {
        tracing::warn!(operation, error = %err, "store operation failed");
        self.publish(BoardEvent::Notice(format!("Could not {operation} task: {err}")));
        BoardError::Store(err)
    }

    fn publish(&self, event: BoardEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Renumbers one column `1..=N` in display order.
fn renumber(tasks: &mut [Task], status: Status) {
    let ids: Vec<TaskId> = GroupedView::build(tasks)
        .column(status)
        .iter()
        .map(|t| t.id.clone())
        .collect();
    for (position, id) in ids.iter().enumerate() {
        if let Some(task) = tasks.iter_mut().find(|t| &t.id == id) {
            task.order = order_at(position);
        }
    }
}
