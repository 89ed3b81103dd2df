//! Task store client abstraction.
//!
//! Defines the [`TaskStoreClient`] trait the board talks to. Concrete
//! implementations:
//! - [`http::HttpTaskStore`]: REST/JSON client for a running task store
//! - [`loopback::LoopbackStore`]: in-process store for testing

pub mod http;
pub mod loopback;

use std::future::Future;

use kanban_proto::{NewTask, ReorderRequest, Status, Task, TaskId, TaskPatch};

/// Errors returned by a task store client.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store answered with a non-success status.
    #[error("store returned {status}: {code}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error code from the response body, or the raw body if it had none.
        code: String,
    },

    /// The request never produced a response (connection refused, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// A success response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The configured store URL cannot address the REST routes.
    #[error("invalid store url: {0}")]
    InvalidUrl(String),
}

impl StoreError {
    /// Returns `true` if the store reported the task as unknown.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Async interface to the authoritative task store.
///
/// Every method is one network round-trip. Implementations never retry;
/// callers decide what a failure means for local state.
pub trait TaskStoreClient: Send + Sync {
    /// Fetch every task, or only those in `status`.
    ///
    /// Records that cannot be decoded are dropped rather than failing the
    /// whole listing.
    fn list(
        &self,
        status: Option<Status>,
    ) -> impl Future<Output = Result<Vec<Task>, StoreError>> + Send;

    /// Fetch a single task.
    fn get(&self, id: &TaskId) -> impl Future<Output = Result<Task, StoreError>> + Send;

    /// Create a task; the store assigns id and order.
    fn create(&self, task: NewTask) -> impl Future<Output = Result<Task, StoreError>> + Send;

    /// Apply a partial update.
    fn update(
        &self,
        id: &TaskId,
        patch: TaskPatch,
    ) -> impl Future<Output = Result<Task, StoreError>> + Send;

    /// Delete a task.
    fn delete(&self, id: &TaskId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Move a task to `request.status` at `request.index`.
    fn reorder(
        &self,
        id: &TaskId,
        request: ReorderRequest,
    ) -> impl Future<Output = Result<Task, StoreError>> + Send;
}
