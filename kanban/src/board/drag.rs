//! Presentational drag state.

use kanban_proto::{Status, TaskId};

use super::resolver::{DragEnd, DropTarget};

/// Whether a task is currently being dragged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragSession {
    /// No gesture in progress.
    #[default]
    Idle,
    /// A task is being dragged.
    Dragging {
        /// The dragged task.
        id: TaskId,
        /// Column the gesture started in.
        origin: Option<Status>,
    },
}

impl DragSession {
    /// Starts dragging `id`, replacing any gesture in progress.
    pub fn start(&mut self, id: TaskId, origin: Option<Status>) {
        *self = Self::Dragging { id, origin };
    }

    /// Ends the gesture over `over` and returns it for resolution.
    ///
    /// Returns `None` if nothing was being dragged. The session is idle
    /// afterwards whatever the drop resolves to.
    pub fn end(&mut self, over: Option<DropTarget>) -> Option<DragEnd> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::Dragging { id, origin } => Some(DragEnd {
                active: id,
                origin,
                over,
            }),
        }
    }

    /// Abandons the gesture.
    pub fn cancel(&mut self) {
        *self = Self::Idle;
    }

    /// The task being dragged, if any.
    #[must_use]
    pub const fn active(&self) -> Option<&TaskId> {
        match self {
            Self::Idle => None,
            Self::Dragging { id, .. } => Some(id),
        }
    }
}
