//! Shared task model and wire types for the Kanban board.
//!
//! Both the board client (`kanban`) and the reference task store
//! (`kanban-store`) speak these types over JSON.

pub mod request;
pub mod task;
pub mod validation;

pub use request::{ErrorBody, NewTask, ReorderRequest, TaskPatch};
pub use task::{Status, Task, TaskId, UnknownStatus};
pub use validation::{MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH, ValidationError};
