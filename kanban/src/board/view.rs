//! Grouped projection of the flat task collection.

use kanban_proto::{Status, Task, TaskId};

/// Tasks grouped by column, each column in canonical display order.
///
/// Derived from the flat collection on demand and never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedView {
    columns: [Vec<Task>; 3],
}

const fn slot(status: Status) -> usize {
    match status {
        Status::Todo => 0,
        Status::Doing => 1,
        Status::Done => 2,
    }
}

impl GroupedView {
    /// Groups `tasks` by status and sorts each column with
    /// [`Task::display_cmp`].
    #[must_use]
    pub fn build(tasks: &[Task]) -> Self {
        let mut columns: [Vec<Task>; 3] = Default::default();
        for task in tasks {
            columns[slot(task.status)].push(task.clone());
        }
        for column in &mut columns {
            column.sort_by(Task::display_cmp);
        }
        Self { columns }
    }

    /// The ordered tasks of one column.
    #[must_use]
    pub fn column(&self, status: Status) -> &[Task] {
        &self.columns[slot(status)]
    }

    /// Number of tasks in one column.
    #[must_use]
    pub fn len(&self, status: Status) -> usize {
        self.columns[slot(status)].len()
    }

    /// Returns `true` if no column holds a task.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Vec::is_empty)
    }

    /// Column and 0-based position of a task.
    #[must_use]
    pub fn locate(&self, id: &TaskId) -> Option<(Status, usize)> {
        Status::ALL.into_iter().find_map(|status| {
            self.column(status)
                .iter()
                .position(|t| &t.id == id)
                .map(|index| (status, index))
        })
    }

    /// Columns in board order.
    pub fn columns(&self) -> impl Iterator<Item = (Status, &[Task])> {
        Status::ALL
            .into_iter()
            .map(|status| (status, self.column(status)))
    }
}
