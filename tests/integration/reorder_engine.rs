//! Integration tests for the optimistic reorder engine.
//!
//! Drives a `Board` against the in-process `LoopbackStore`, pausing store
//! replies where a test needs to observe the optimistic state.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::similar_names,
    clippy::redundant_clone
)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use kanban::board::{Board, BoardError, BoardEvent, DragEnd, DragSession, DropTarget, GroupedView};
use kanban::store::loopback::{LoopbackStore, Operation};
use kanban_proto::{NewTask, Status, Task, TaskId, TaskPatch};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn make_task(id: &str, status: Status, order: u32) -> Task {
    let at = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
    Task {
        id: TaskId::from(id),
        title: id.to_uppercase(),
        description: None,
        status,
        order,
        created_at: at,
        updated_at: at,
    }
}

/// `[A(todo,1), B(todo,2), C(doing,1)]`
fn abc() -> Vec<Task> {
    vec![
        make_task("a", Status::Todo, 1),
        make_task("b", Status::Todo, 2),
        make_task("c", Status::Doing, 1),
    ]
}

async fn loaded_board(tasks: Vec<Task>) -> (Arc<LoopbackStore>, Arc<Board<LoopbackStore>>) {
    let store = Arc::new(LoopbackStore::new(tasks));
    let board = Arc::new(Board::new(Arc::clone(&store)));
    board.refresh().await.unwrap();
    (store, board)
}

/// Column contents as `(id, order)` pairs in display order.
fn column(tasks: &[Task], status: Status) -> Vec<(String, u32)> {
    GroupedView::build(tasks)
        .column(status)
        .iter()
        .map(|t| (t.id.to_string(), t.order))
        .collect()
}

fn pairs(expected: &[(&str, u32)]) -> Vec<(String, u32)> {
    expected
        .iter()
        .map(|(id, order)| ((*id).to_string(), *order))
        .collect()
}

fn drag(active: &str, onto: &str) -> DragEnd {
    DragEnd {
        active: TaskId::from(active),
        origin: None,
        over: Some(DropTarget::from_key(onto)),
    }
}

/// Waits for the next `Changed` event, skipping notices.
async fn next_change(events: &mut broadcast::Receiver<BoardEvent>) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if events.recv().await.unwrap() == BoardEvent::Changed {
                return;
            }
        }
    })
    .await
    .expect("no board change within 5s");
}

/// Waits until the store has received `n` requests of `operation`.
async fn requests(store: &LoopbackStore, operation: Operation, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.calls(operation) < n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("request never reached the store");
}

fn assert_dense(tasks: &[Task]) {
    let view = GroupedView::build(tasks);
    for (status, column) in view.columns() {
        let orders: Vec<u32> = column.iter().map(|t| t.order).collect();
        let expected: Vec<u32> = (1..=u32::try_from(column.len()).unwrap()).collect();
        assert_eq!(orders, expected, "column {status} is not dense");
    }
}

// ===========================================================================
// Optimistic application
// ===========================================================================

#[tokio::test]
async fn column_drop_is_visible_before_confirmation() {
    let (store, board) = loaded_board(abc()).await;
    store.hold(Operation::Reorder);
    let mut events = board.subscribe();

    let handle = {
        let board = Arc::clone(&board);
        tokio::spawn(async move { board.handle_drag_end(&drag("a", "column:doing")).await })
    };

    next_change(&mut events).await;
    let optimistic = board.snapshot();
    assert_eq!(column(&optimistic, Status::Todo), pairs(&[("b", 1)]));
    assert_eq!(
        column(&optimistic, Status::Doing),
        pairs(&[("c", 1), ("a", 2)])
    );

    store.release(Operation::Reorder);
    let saved = handle.await.unwrap().unwrap().unwrap();
    assert_eq!((saved.status, saved.order), (Status::Doing, 2));
    assert_dense(&board.snapshot());
}

#[tokio::test]
async fn column_drop_appends_at_pre_drop_count() {
    let (_store, board) = loaded_board(abc()).await;
    let saved = board
        .handle_drag_end(&drag("b", "column:doing"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.status, Status::Doing);
    assert_eq!(saved.order, 2);
}

#[tokio::test]
async fn card_drop_takes_card_position() {
    let (_store, board) = loaded_board(abc()).await;
    board.handle_drag_end(&drag("c", "a")).await.unwrap();

    let tasks = board.snapshot();
    assert_eq!(
        column(&tasks, Status::Todo),
        pairs(&[("c", 1), ("a", 2), ("b", 3)])
    );
    assert!(column(&tasks, Status::Doing).is_empty());
}

// ===========================================================================
// No-op drops
// ===========================================================================

#[tokio::test]
async fn drop_onto_own_position_sends_nothing() {
    let (store, board) = loaded_board(abc()).await;
    let before = board.snapshot();

    let result = board.handle_drag_end(&drag("b", "b")).await.unwrap();
    assert!(result.is_none());
    assert_eq!(store.calls(Operation::Reorder), 0);
    assert_eq!(board.snapshot(), before);
}

#[tokio::test]
async fn drop_on_nothing_or_unknown_column_sends_nothing() {
    let (store, board) = loaded_board(abc()).await;
    let nowhere = DragEnd {
        active: TaskId::from("a"),
        origin: Some(Status::Todo),
        over: None,
    };
    assert!(board.handle_drag_end(&nowhere).await.unwrap().is_none());
    assert!(
        board
            .handle_drag_end(&drag("a", "column:archive"))
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(store.calls(Operation::Reorder), 0);
}

#[tokio::test]
async fn drag_session_feeds_resolver() {
    let (_store, board) = loaded_board(abc()).await;
    let mut session = DragSession::default();

    session.start(TaskId::from("a"), Some(Status::Todo));
    let end = session.end(Some(DropTarget::column(Status::Done))).unwrap();
    assert_eq!(session, DragSession::Idle);

    let saved = board.handle_drag_end(&end).await.unwrap().unwrap();
    assert_eq!((saved.status, saved.order), (Status::Done, 1));
}

// ===========================================================================
// Rollback and reconciliation
// ===========================================================================

#[tokio::test]
async fn failed_reorder_restores_snapshot() {
    let (store, board) = loaded_board(abc()).await;
    let before = board.snapshot();
    let mut events = board.subscribe();
    store.fail_next(Operation::Reorder);

    let err = board
        .handle_drag_end(&drag("a", "column:doing"))
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::Store(_)));
    assert_eq!(board.snapshot(), before);
    assert_eq!(column(&before, Status::Todo), pairs(&[("a", 1), ("b", 2)]));

    let mut notices = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let BoardEvent::Notice(text) = event {
            notices.push(text);
        }
    }
    assert_eq!(notices.len(), 1);
}

#[tokio::test]
async fn server_state_wins_after_settle() {
    let (store, board) = loaded_board(abc()).await;
    store.hold(Operation::Reorder);

    let handle = {
        let board = Arc::clone(&board);
        tokio::spawn(async move {
            board
                .reorder(&TaskId::from("a"), Status::Doing, 0)
                .await
        })
    };
    requests(&store, Operation::Reorder, 1).await;

    // Another client deletes B and adds D while our move is pending.
    let mut server = store.tasks();
    server.retain(|t| t.id.as_str() != "b");
    server.push(make_task("d", Status::Doing, 3));
    store.set_tasks(server);

    store.release(Operation::Reorder);
    handle.await.unwrap().unwrap();

    assert_eq!(
        GroupedView::build(&board.snapshot()),
        GroupedView::build(&store.tasks())
    );
    assert!(board.task(&TaskId::from("b")).is_none());
    assert!(board.task(&TaskId::from("d")).is_some());
}

#[tokio::test]
async fn refresh_failure_keeps_confirmed_move() {
    let (store, board) = loaded_board(abc()).await;
    let mut events = board.subscribe();
    store.fail_next(Operation::List);

    let saved = board
        .reorder(&TaskId::from("c"), Status::Todo, 0)
        .await
        .unwrap();
    assert_eq!(board.task(&saved.id), Some(saved));

    let mut saw_notice = false;
    while let Ok(event) = events.try_recv() {
        saw_notice |= matches!(event, BoardEvent::Notice(_));
    }
    assert!(saw_notice);
}

#[tokio::test]
async fn abandoned_reorder_restores_snapshot() {
    let (store, board) = loaded_board(abc()).await;
    let before = board.snapshot();
    store.hold(Operation::Reorder);
    store.fail_next(Operation::Reorder);

    let handle = {
        let board = Arc::clone(&board);
        tokio::spawn(async move {
            board
                .reorder(&TaskId::from("a"), Status::Doing, 1)
                .await
        })
    };
    requests(&store, Operation::Reorder, 1).await;
    assert_ne!(board.snapshot(), before);

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    store.release(Operation::Reorder);

    assert_eq!(board.snapshot(), before);
    assert_eq!(column(&store.tasks(), Status::Todo), pairs(&[("a", 1), ("b", 2)]));

    // The in-flight mark went with the abandoned call.
    board
        .reorder(&TaskId::from("a"), Status::Doing, 1)
        .await
        .unwrap();
    assert_eq!(
        column(&board.snapshot(), Status::Doing),
        pairs(&[("c", 1), ("a", 2)])
    );
}

// ===========================================================================
// Concurrency
// ===========================================================================

#[tokio::test]
async fn second_reorder_of_in_flight_task_is_rejected() {
    let (store, board) = loaded_board(abc()).await;
    store.hold(Operation::Reorder);
    let mut events = board.subscribe();

    let first = {
        let board = Arc::clone(&board);
        tokio::spawn(async move {
            board
                .reorder(&TaskId::from("a"), Status::Done, 0)
                .await
        })
    };
    next_change(&mut events).await;
    let optimistic = board.snapshot();

    let err = board
        .reorder(&TaskId::from("a"), Status::Todo, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::ReorderInFlight(_)));
    assert_eq!(board.snapshot(), optimistic);

    store.release(Operation::Reorder);
    first.await.unwrap().unwrap();
    assert_eq!(store.calls(Operation::Reorder), 1);

    // Settled: the task can move again.
    board
        .reorder(&TaskId::from("a"), Status::Todo, 0)
        .await
        .unwrap();
    assert_eq!(store.calls(Operation::Reorder), 2);
}

#[tokio::test]
async fn reorders_of_different_tasks_may_overlap() {
    let (_store, board) = loaded_board(abc()).await;

    let (left, right) = futures_util::future::join(
        board.reorder(&TaskId::from("a"), Status::Done, 0),
        board.reorder(&TaskId::from("c"), Status::Todo, 0),
    )
    .await;
    left.unwrap();
    right.unwrap();

    board.refresh().await.unwrap();
    let tasks = board.snapshot();
    assert_dense(&tasks);
    assert_eq!(column(&tasks, Status::Done), pairs(&[("a", 1)]));
}

#[tokio::test]
async fn detached_board_discards_late_response() {
    let (store, board) = loaded_board(abc()).await;
    store.hold(Operation::Reorder);

    let handle = {
        let board = Arc::clone(&board);
        tokio::spawn(async move {
            board
                .reorder(&TaskId::from("a"), Status::Doing, 1)
                .await
        })
    };
    requests(&store, Operation::Reorder, 1).await;
    let optimistic = board.snapshot();

    board.detach();
    store.release(Operation::Reorder);

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, BoardError::Detached));
    // The store's record (with its new updated_at) was never applied.
    assert_eq!(board.snapshot(), optimistic);
}

#[tokio::test]
async fn detached_board_discards_late_refresh() {
    let (store, board) = loaded_board(abc()).await;
    let before = board.snapshot();
    store.set_tasks(vec![make_task("z", Status::Done, 1)]);
    store.hold(Operation::List);

    let handle = {
        let board = Arc::clone(&board);
        tokio::spawn(async move { board.refresh().await })
    };
    requests(&store, Operation::List, 2).await;

    board.detach();
    store.release(Operation::List);

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, BoardError::Detached));
    assert_eq!(board.snapshot(), before);
}

#[tokio::test]
async fn detached_board_discards_late_create() {
    let (store, board) = loaded_board(abc()).await;
    let before = board.snapshot();
    store.hold(Operation::Create);

    let handle = {
        let board = Arc::clone(&board);
        tokio::spawn(async move { board.create(NewTask::new("late")).await })
    };
    requests(&store, Operation::Create, 1).await;

    board.detach();
    store.release(Operation::Create);

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, BoardError::Detached));
    assert_eq!(board.snapshot(), before);
    assert_eq!(store.tasks().len(), 4);
}

#[tokio::test]
async fn detached_board_discards_late_update() {
    let (store, board) = loaded_board(abc()).await;
    let before = board.snapshot();
    store.hold(Operation::Update);

    let handle = {
        let board = Arc::clone(&board);
        tokio::spawn(async move {
            let patch = TaskPatch {
                title: Some("renamed".to_string()),
                ..TaskPatch::default()
            };
            board.update(&TaskId::from("a"), patch).await
        })
    };
    requests(&store, Operation::Update, 1).await;

    board.detach();
    store.release(Operation::Update);

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, BoardError::Detached));
    assert_eq!(board.snapshot(), before);
}

#[tokio::test]
async fn detached_board_discards_late_status_refresh() {
    let (store, board) = loaded_board(abc()).await;
    store.hold(Operation::List);

    let handle = {
        let board = Arc::clone(&board);
        tokio::spawn(async move {
            let patch = TaskPatch {
                status: Some(Status::Done),
                ..TaskPatch::default()
            };
            board.update(&TaskId::from("a"), patch).await
        })
    };
    // The initial load was the first listing.
    requests(&store, Operation::List, 2).await;
    let folded = board.snapshot();

    board.detach();
    store.release(Operation::List);

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, BoardError::Detached));
    assert_eq!(board.snapshot(), folded);
}

#[tokio::test]
async fn detached_board_discards_late_delete() {
    let (store, board) = loaded_board(abc()).await;
    let before = board.snapshot();
    store.hold(Operation::Delete);

    let handle = {
        let board = Arc::clone(&board);
        tokio::spawn(async move { board.delete(&TaskId::from("a")).await })
    };
    requests(&store, Operation::Delete, 1).await;

    board.detach();
    store.release(Operation::Delete);

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, BoardError::Detached));
    assert_eq!(board.snapshot(), before);
    assert!(board.task(&TaskId::from("a")).is_some());
}

#[tokio::test]
async fn random_drag_sequence_settles_dense() {
    let mut tasks = abc();
    tasks.push(make_task("d", Status::Done, 1));
    tasks.push(make_task("e", Status::Done, 2));
    let (store, board) = loaded_board(tasks).await;

    let moves = [
        ("a", "column:done"),
        ("e", "b"),
        ("c", "column:todo"),
        ("d", "d"),
        ("b", "a"),
        ("a", "column:doing"),
    ];
    for (active, onto) in moves {
        board.handle_drag_end(&drag(active, onto)).await.unwrap();
        assert_dense(&board.snapshot());
    }
    assert_eq!(
        GroupedView::build(&board.snapshot()),
        GroupedView::build(&store.tasks())
    );
}
