//! Plain-text rendering of the grouped board.

use std::fmt::Write as _;

use kanban_proto::Task;

use crate::board::GroupedView;

/// Renders every column as a heading followed by one line per task.
///
/// ```text
/// Todo (2)
///   1. Write docs  [0190c1b2-...]
///      needs examples
///   2. Ship it  [0190c1b3-...]
/// Doing (0)
///   (empty)
/// ```
#[must_use]
pub fn render_board(view: &GroupedView) -> String {
    let mut out = String::new();
    for (status, tasks) in view.columns() {
        let _ = writeln!(out, "{} ({})", status.label(), tasks.len());
        if tasks.is_empty() {
            out.push_str("  (empty)\n");
        }
        for task in tasks {
            render_task(&mut out, task);
        }
    }
    out
}

/// Renders a single task on one or two lines.
#[must_use]
pub fn render_task_line(task: &Task) -> String {
    let mut out = String::new();
    render_task(&mut out, task);
    out
}

fn render_task(out: &mut String, task: &Task) {
    let _ = writeln!(out, "  {}. {}  [{}]", task.order, task.title, task.id);
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "     {}", first_line(description));
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
