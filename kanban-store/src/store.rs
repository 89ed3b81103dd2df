//! Authoritative in-memory task collection with optional JSON persistence.
//!
//! The [`TaskStore`] owns durable status and order values. Every mutation
//! leaves each column densely numbered `1..=N`, and every task whose status
//! or order changes gets a fresh `updated_at`. When a data file is
//! configured the whole collection is rewritten atomically after each
//! mutation.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kanban_proto::{NewTask, ReorderRequest, Status, Task, TaskId, TaskPatch, ValidationError};
use tokio::sync::RwLock;

/// Errors returned by [`TaskStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskStoreError {
    /// No task with the given id exists.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The request failed field validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The data file exists but could not be read.
    #[error("failed to read task file {path}: {source}")]
    Load {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The data file is not a JSON task array.
    #[error("failed to parse task file {path}: {source}")]
    Parse {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },

    /// Writing the data file failed.
    #[error("failed to write task file {path}: {source}")]
    Persist {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Encoding the snapshot failed.
    #[error("failed to encode tasks: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The authoritative task collection.
///
/// Thread-safe via [`RwLock`]; a write lock is held for the whole of each
/// mutation so concurrent reorders are serialised.
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
    data_file: Option<PathBuf>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    /// Creates an empty, memory-only store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    /// Creates a memory-only store seeded with `seed`.
    ///
    /// Every column is renumbered so seeded data satisfies the dense
    /// ordering invariant from the start.
    #[must_use]
    pub fn with_tasks(seed: Vec<Task>) -> Self {
        let mut tasks: HashMap<TaskId, Task> =
            seed.into_iter().map(|t| (t.id.clone(), t)).collect();
        let now = Utc::now();
        for status in Status::ALL {
            renumber_column(&mut tasks, status, now);
        }
        Self {
            tasks: RwLock::new(tasks),
            data_file: None,
        }
    }

    /// Opens a store backed by a JSON data file.
    ///
    /// A missing file is an empty board; it is created on the first
    /// mutation.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Load`] or [`TaskStoreError::Parse`] if an
    /// existing file cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TaskStoreError> {
        let path = path.into();
        let seed = load_tasks(&path)?;
        tracing::info!(path = %path.display(), count = seed.len(), "loaded tasks");
        let mut store = Self::with_tasks(seed);
        store.data_file = Some(path);
        Ok(store)
    }

    /// Returns the data file, if persistence is enabled.
    #[must_use]
    pub fn data_file(&self) -> Option<&Path> {
        self.data_file.as_deref()
    }

    /// Lists tasks, optionally restricted to one column, in board order.
    pub async fn list(&self, status: Option<Status>) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut items: Vec<Task> = tasks
            .values()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        drop(tasks);
        items.sort_by(board_cmp);
        items
    }

    /// Fetches a single task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] for an unknown id.
    pub async fn get(&self, id: &TaskId) -> Result<Task, TaskStoreError> {
        let tasks = self.tasks.read().await;
        tasks
            .get(id)
            .cloned()
            .ok_or_else(|| TaskStoreError::NotFound(id.clone()))
    }

    /// Creates a task at the bottom of its column (default `todo`).
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad title or description, or a
    /// persistence error.
    pub async fn create(&self, request: NewTask) -> Result<Task, TaskStoreError> {
        let request = request.validated()?;
        let status = request.status.unwrap_or_default();
        let now = Utc::now();

        let mut tasks = self.tasks.write().await;
        let task = Task {
            id: TaskId::generate(),
            title: request.title,
            description: request.description,
            status,
            order: next_order(&tasks, status),
            created_at: now,
            updated_at: now,
        };
        tasks.insert(task.id.clone(), task.clone());
        self.persist(&tasks)?;
        drop(tasks);

        tracing::debug!(task_id = %task.id, status = %status, order = task.order, "task created");
        Ok(task)
    }

    /// Applies a partial update.
    ///
    /// A status change appends the task to the bottom of the new column and
    /// renumbers the column it left.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`], a validation error, or a
    /// persistence error.
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, TaskStoreError> {
        let patch = patch.validated()?;
        let now = Utc::now();

        let mut tasks = self.tasks.write().await;
        let previous = tasks
            .get(id)
            .ok_or_else(|| TaskStoreError::NotFound(id.clone()))?
            .status;
        let moved_to = patch
            .status
            .filter(|s| *s != previous)
            .map(|s| (s, next_order(&tasks, s)));

        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskStoreError::NotFound(id.clone()))?;
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = (!description.is_empty()).then_some(description);
        }
        if let Some((status, order)) = moved_to {
            task.status = status;
            task.order = order;
        }
        task.updated_at = now;
        let updated = task.clone();

        if moved_to.is_some() {
            renumber_column(&mut tasks, previous, now);
        }
        self.persist(&tasks)?;
        drop(tasks);

        tracing::debug!(task_id = %id, "task updated");
        Ok(updated)
    }

    /// Deletes a task and renumbers the column it lived in.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] or a persistence error.
    pub async fn delete(&self, id: &TaskId) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        let removed = tasks
            .remove(id)
            .ok_or_else(|| TaskStoreError::NotFound(id.clone()))?;
        renumber_column(&mut tasks, removed.status, Utc::now());
        self.persist(&tasks)?;
        drop(tasks);

        tracing::debug!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Moves a task to `request.status` at 0-based `request.index`.
    ///
    /// The index is clamped to the destination column's length (excluding
    /// the moving task). Destination and, for cross-column moves, source
    /// columns are renumbered.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] or a persistence error.
    pub async fn reorder(
        &self,
        id: &TaskId,
        request: ReorderRequest,
    ) -> Result<Task, TaskStoreError> {
        let now = Utc::now();

        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskStoreError::NotFound(id.clone()))?;
        let source = task.status;
        task.updated_at = now;

        let mut destination = column_ids(&tasks, request.status, Some(id));
        let index = request.index.min(destination.len());
        destination.insert(index, id.clone());
        assign_positions(&mut tasks, &destination, request.status, now);
        if source != request.status {
            renumber_column(&mut tasks, source, now);
        }

        let saved = tasks
            .get(id)
            .cloned()
            .ok_or_else(|| TaskStoreError::NotFound(id.clone()))?;
        self.persist(&tasks)?;
        drop(tasks);

        tracing::debug!(
            task_id = %id,
            from = %source,
            to = %request.status,
            index,
            "task reordered"
        );
        Ok(saved)
    }

    fn persist(&self, tasks: &HashMap<TaskId, Task>) -> Result<(), TaskStoreError> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };
        let mut snapshot: Vec<&Task> = tasks.values().collect();
        snapshot.sort_by(|a, b| board_cmp(a, b));
        save_tasks(path, &snapshot)
    }
}

/// Reads a JSON task array. A missing file yields an empty list.
///
/// # Errors
///
/// Returns [`TaskStoreError::Load`] or [`TaskStoreError::Parse`].
pub fn load_tasks(path: &Path) -> Result<Vec<Task>, TaskStoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|source| TaskStoreError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(TaskStoreError::Load {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes a pretty-printed JSON task array via a temp file and rename.
///
/// # Errors
///
/// Returns [`TaskStoreError::Persist`] or [`TaskStoreError::Encode`].
pub fn save_tasks(path: &Path, tasks: &[&Task]) -> Result<(), TaskStoreError> {
    let persist_err = |source: std::io::Error| TaskStoreError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(persist_err)?;

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(persist_err)?;
    serde_json::to_writer_pretty(&mut file, tasks)?;
    file.write_all(b"\n").map_err(persist_err)?;
    file.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Column helpers (caller holds the write lock)
// ---------------------------------------------------------------------------

fn board_cmp(a: &Task, b: &Task) -> std::cmp::Ordering {
    a.status.cmp(&b.status).then_with(|| a.display_cmp(b))
}

fn next_order(tasks: &HashMap<TaskId, Task>, status: Status) -> u32 {
    tasks
        .values()
        .filter(|t| t.status == status)
        .map(|t| t.order)
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

/// Ids of a column in display order, optionally leaving one task out.
fn column_ids(
    tasks: &HashMap<TaskId, Task>,
    status: Status,
    exclude: Option<&TaskId>,
) -> Vec<TaskId> {
    let mut column: Vec<&Task> = tasks
        .values()
        .filter(|t| t.status == status && Some(&t.id) != exclude)
        .collect();
    column.sort_by(|a, b| a.display_cmp(b));
    column.into_iter().map(|t| t.id.clone()).collect()
}

/// Places `ids` into `status` with orders `1..=N`, touching `updated_at`
/// only where something changed.
fn assign_positions(
    tasks: &mut HashMap<TaskId, Task>,
    ids: &[TaskId],
    status: Status,
    now: DateTime<Utc>,
) {
    for (position, id) in ids.iter().enumerate() {
        let Some(task) = tasks.get_mut(id) else {
            continue;
        };
        let order = u32::try_from(position + 1).unwrap_or(u32::MAX);
        if task.order != order || task.status != status {
            task.order = order;
            task.status = status;
            task.updated_at = now;
        }
    }
}

fn renumber_column(tasks: &mut HashMap<TaskId, Task>, status: Status, now: DateTime<Utc>) {
    let ids = column_ids(tasks, status, None);
    assign_positions(tasks, &ids, status, now);
}
