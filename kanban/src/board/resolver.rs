//! Turns a finished drag gesture into a reorder intent.
//!
//! Resolution rules, applied in order:
//! 1. nothing under the pointer: no-op;
//! 2. a column surface: append to that column;
//! 3. a task card: take the card's column and its position in that column;
//! 4. the result equals the dragged task's current place: no-op.
//!
//! A drop whose destination column cannot be resolved is discarded.

use kanban_proto::{Status, TaskId};

use super::view::GroupedView;

/// Key prefix of column-surface drop targets (`column:<status>`).
pub const COLUMN_KEY_PREFIX: &str = "column:";

/// The element under the pointer when a drag ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// A task card, with whatever column and index metadata it carries.
    Card {
        /// Id of the card under the pointer.
        id: TaskId,
        /// Column the card was rendered in.
        status: Option<Status>,
        /// Position the card was rendered at.
        index: Option<usize>,
    },
    /// An empty stretch of a column; the raw column id from its key.
    Column(String),
}

impl DropTarget {
    /// A card target with no metadata.
    pub fn card(id: impl Into<TaskId>) -> Self {
        Self::Card {
            id: id.into(),
            status: None,
            index: None,
        }
    }

    /// A column-surface target.
    #[must_use]
    pub fn column(status: Status) -> Self {
        Self::Column(status.as_str().to_string())
    }

    /// Parses a droppable key: `column:<id>` is a column surface, anything
    /// else is a card id.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        key.strip_prefix(COLUMN_KEY_PREFIX).map_or_else(
            || Self::card(TaskId::new(key)),
            |column| Self::Column(column.to_string()),
        )
    }
}

/// A drag gesture that has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEnd {
    /// The dragged task.
    pub active: TaskId,
    /// Column the drag started in, if the source reported it.
    pub origin: Option<Status>,
    /// What the pointer ended over.
    pub over: Option<DropTarget>,
}

/// Where a dropped task should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderIntent {
    /// Task to move.
    pub id: TaskId,
    /// Destination column.
    pub status: Status,
    /// 0-based destination index.
    pub index: usize,
}

/// Resolves a drag end against the current grouped view.
///
/// Returns `None` when the drop should be ignored.
#[must_use]
pub fn resolve(drag: &DragEnd, view: &GroupedView) -> Option<ReorderIntent> {
    let over = drag.over.as_ref()?;

    let (status, index) = match over {
        DropTarget::Column(raw) => {
            let Ok(status) = raw.parse::<Status>() else {
                tracing::debug!(column = %raw, "drop on unknown column ignored");
                return None;
            };
            (status, view.len(status))
        }
        DropTarget::Card { id, status, index } => match (view.locate(id), status) {
            // Column and index always come from the same source.
            (Some(place), _) => place,
            (None, Some(status)) => (*status, index.unwrap_or(0)),
            (None, None) => {
                tracing::debug!(task_id = %id, "drop on card with no column ignored");
                return None;
            }
        },
    };

    let current = view.locate(&drag.active);
    let origin = drag.origin.or(current.map(|(s, _)| s));
    if origin == Some(status) && current.map(|(_, i)| i) == Some(index) {
        return None;
    }

    Some(ReorderIntent {
        id: drag.active.clone(),
        status,
        index,
    })
}
