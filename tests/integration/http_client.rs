//! Integration tests for the HTTP task store client.
//!
//! Runs the real task store in-process on an ephemeral port and drives it
//! through `HttpTaskStore` and a `Board`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use kanban::board::{Board, BoardError, DragEnd, DropTarget, GroupedView};
use kanban::store::http::HttpTaskStore;
use kanban::store::{StoreError, TaskStoreClient};
use kanban_proto::{NewTask, ReorderRequest, Status, TaskId, TaskPatch};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Starts a memory-only store server and returns a client for it.
async fn start_store() -> (HttpTaskStore, tokio::task::JoinHandle<()>) {
    let (addr, handle) = kanban_store::api::start_server("127.0.0.1:0")
        .await
        .expect("failed to start store server");
    let client = HttpTaskStore::new(&format!("http://{addr}"), Some(Duration::from_secs(5)))
        .expect("valid store url");
    (client, handle)
}

async fn seed(client: &HttpTaskStore, titles: &[(&str, Status)]) -> Vec<TaskId> {
    let mut ids = Vec::new();
    for (title, status) in titles {
        let task = client
            .create(NewTask::new(*title).with_status(*status))
            .await
            .unwrap();
        ids.push(task.id);
    }
    ids
}

// ===========================================================================
// Client
// ===========================================================================

#[tokio::test]
async fn crud_round_trip() {
    let (client, _handle) = start_store().await;

    let created = client
        .create(NewTask::new("Write docs").with_description("for the store"))
        .await
        .unwrap();
    assert_eq!(created.status, Status::Todo);
    assert_eq!(created.order, 1);

    let fetched = client.get(&created.id).await.unwrap();
    assert_eq!(fetched, created);

    let patch = TaskPatch {
        title: Some("Write more docs".to_string()),
        description: Some(String::new()),
        status: None,
    };
    let updated = client.update(&created.id, patch).await.unwrap();
    assert_eq!(updated.title, "Write more docs");
    assert_eq!(updated.description, None);
    assert!(updated.updated_at >= created.updated_at);

    client.delete(&created.id).await.unwrap();
    let err = client.get(&created.id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn list_filters_by_status() {
    let (client, _handle) = start_store().await;
    seed(
        &client,
        &[("a", Status::Todo), ("b", Status::Done), ("c", Status::Done)],
    )
    .await;

    assert_eq!(client.list(None).await.unwrap().len(), 3);
    let done = client.list(Some(Status::Done)).await.unwrap();
    let titles: Vec<&str> = done.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["b", "c"]);
}

#[tokio::test]
async fn error_codes_surface_as_status_errors() {
    let (client, _handle) = start_store().await;

    let err = client
        .create(NewTask::new("x".repeat(141)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Status { status: 400, ref code } if code == "invalid_title"
    ));

    let err = client
        .reorder(
            &TaskId::from("missing"),
            ReorderRequest {
                status: Status::Done,
                index: 0,
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn ping_reports_reachability() {
    let (client, _handle) = start_store().await;
    assert!(client.ping().await);

    let nowhere =
        HttpTaskStore::new("http://127.0.0.1:1", Some(Duration::from_millis(500))).unwrap();
    assert!(!nowhere.ping().await);
}

#[tokio::test]
async fn unreachable_store_is_transport_error() {
    let client = HttpTaskStore::new("http://127.0.0.1:1", Some(Duration::from_millis(500))).unwrap();
    let err = client.list(None).await.unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)));
}

// ===========================================================================
// Board against the real store
// ===========================================================================

#[tokio::test]
async fn board_drag_reconciles_with_store() {
    let (client, _handle) = start_store().await;
    let ids = seed(
        &client,
        &[("a", Status::Todo), ("b", Status::Todo), ("c", Status::Doing)],
    )
    .await;
    let board = Board::new(Arc::new(client.clone()));
    board.refresh().await.unwrap();

    let drag = DragEnd {
        active: ids[0].clone(),
        origin: Some(Status::Todo),
        over: Some(DropTarget::column(Status::Doing)),
    };
    let saved = board.handle_drag_end(&drag).await.unwrap().unwrap();
    assert_eq!((saved.status, saved.order), (Status::Doing, 2));

    let server = client.list(None).await.unwrap();
    assert_eq!(GroupedView::build(&board.snapshot()), GroupedView::build(&server));

    let view = board.view();
    let todo: Vec<u32> = view.column(Status::Todo).iter().map(|t| t.order).collect();
    assert_eq!(todo, [1]);
}

#[tokio::test]
async fn board_rolls_back_when_store_rejects() {
    let (client, _handle) = start_store().await;
    let ids = seed(&client, &[("a", Status::Todo), ("b", Status::Todo)]).await;
    let board = Board::new(Arc::new(client.clone()));
    board.refresh().await.unwrap();
    let before = board.snapshot();

    // Deleted behind the board's back: the store answers 404.
    client.delete(&ids[0]).await.unwrap();

    let err = board.reorder(&ids[0], Status::Done, 0).await.unwrap_err();
    assert!(matches!(err, BoardError::Store(ref e) if e.is_not_found()));
    assert_eq!(board.snapshot(), before);
}

#[tokio::test]
async fn board_crud_folds_results() {
    let (client, _handle) = start_store().await;
    let board = Board::new(Arc::new(client));
    board.refresh().await.unwrap();

    let created = board.create(NewTask::new("  trimmed  ")).await.unwrap();
    assert_eq!(created.title, "trimmed");
    assert_eq!(board.snapshot().len(), 1);

    let err = board.create(NewTask::new("")).await.unwrap_err();
    assert!(matches!(err, BoardError::Validation(_)));

    let patch = TaskPatch {
        status: Some(Status::Done),
        ..TaskPatch::default()
    };
    let moved = board.update(&created.id, patch).await.unwrap();
    assert_eq!((moved.status, moved.order), (Status::Done, 1));

    board.delete(&created.id).await.unwrap();
    assert!(board.snapshot().is_empty());
}
