//! Property-based tests for reorder planning and drop resolution.
//!
//! Uses proptest to verify:
//! 1. Any sequence of planned moves leaves every column numbered `1..=N`.
//! 2. A planned move never changes which tasks exist or their `updated_at`.
//! 3. A resolved drop never targets the dragged task's current place.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use kanban::board::{DragEnd, DropTarget, GroupedView, plan_reorder, resolve};
use kanban_proto::{Status, Task, TaskId};
use proptest::prelude::*;

// --- Strategies ---

fn arb_status() -> impl Strategy<Value = Status> {
    prop::sample::select(Status::ALL.to_vec())
}

/// A board of up to 12 tasks with dense columns.
fn arb_board() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec((arb_status(), 0i64..1_000), 1..12).prop_map(|specs| {
        let mut next = [0u32; 3];
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (status, stamp))| {
                let slot = Status::ALL.iter().position(|s| *s == status).unwrap_or(0);
                next[slot] += 1;
                let at = Utc.timestamp_opt(stamp, 0).single().unwrap_or_default();
                Task {
                    id: TaskId::new(format!("t{i}")),
                    title: format!("task {i}"),
                    description: None,
                    status,
                    order: next[slot],
                    created_at: at,
                    updated_at: at,
                }
            })
            .collect()
    })
}

/// A move: (which task, by index modulo board size), column, raw index.
fn arb_moves() -> impl Strategy<Value = Vec<(usize, Status, usize)>> {
    prop::collection::vec((any::<usize>(), arb_status(), 0usize..16), 1..20)
}

fn columns_are_dense(tasks: &[Task]) -> bool {
    let view = GroupedView::build(tasks);
    view.columns().all(|(_, column)| {
        column
            .iter()
            .enumerate()
            .all(|(i, t)| t.order as usize == i + 1)
    })
}

// --- Properties ---

proptest! {
    #[test]
    fn planned_moves_keep_columns_dense(board in arb_board(), moves in arb_moves()) {
        let mut tasks = board;
        for (pick, status, index) in moves {
            let id = tasks[pick % tasks.len()].id.clone();
            let plan = plan_reorder(&tasks, &id, status, index).unwrap();
            prop_assert!(plan.index <= GroupedView::build(&tasks).len(status));
            tasks = plan.tasks;
            prop_assert!(columns_are_dense(&tasks));
        }
    }

    #[test]
    fn planned_move_lands_at_clamped_index(board in arb_board(), pick in any::<usize>(), status in arb_status(), index in 0usize..16) {
        let id = board[pick % board.len()].id.clone();
        let plan = plan_reorder(&board, &id, status, index).unwrap();
        let view = GroupedView::build(&plan.tasks);
        prop_assert_eq!(view.locate(&id), Some((status, plan.index)));
    }

    #[test]
    fn planned_move_preserves_membership_and_timestamps(board in arb_board(), pick in any::<usize>(), status in arb_status(), index in 0usize..16) {
        let id = board[pick % board.len()].id.clone();
        let plan = plan_reorder(&board, &id, status, index).unwrap();
        prop_assert_eq!(plan.tasks.len(), board.len());
        for (before, after) in board.iter().zip(&plan.tasks) {
            prop_assert_eq!(&before.id, &after.id);
            prop_assert_eq!(before.updated_at, after.updated_at);
        }
    }

    #[test]
    fn resolved_drop_never_targets_current_place(board in arb_board(), pick in any::<usize>(), over in any::<usize>(), surface in any::<bool>(), status in arb_status()) {
        let view = GroupedView::build(&board);
        let active = board[pick % board.len()].id.clone();
        let target = if surface {
            DropTarget::column(status)
        } else {
            DropTarget::card(board[over % board.len()].id.clone())
        };
        let drag = DragEnd { active: active.clone(), origin: None, over: Some(target) };
        if let Some(intent) = resolve(&drag, &view) {
            prop_assert_ne!(view.locate(&active), Some((intent.status, intent.index)));
        }
    }
}
