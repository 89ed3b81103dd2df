//! REST interface of the task store.
//!
//! Routes:
//!
//! | Method   | Path                  | Success             |
//! |----------|-----------------------|---------------------|
//! | `GET`    | `/`                   | 204                 |
//! | `GET`    | `/tasks[?status=S]`   | 200, task array     |
//! | `POST`   | `/tasks`              | 201, created task   |
//! | `GET`    | `/tasks/{id}`         | 200, task           |
//! | `PUT`    | `/tasks/{id}`         | 200, updated task   |
//! | `DELETE` | `/tasks/{id}`         | 204                 |
//! | `PUT`    | `/tasks/{id}/reorder` | 200, reordered task |
//!
//! Every failure carries an [`ErrorBody`] with a machine-readable code.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use kanban_proto::{ErrorBody, NewTask, ReorderRequest, Status, Task, TaskId, TaskPatch};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::store::{TaskStore, TaskStoreError};

/// A failed request, rendered as a status code plus [`ErrorBody`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
}

impl ApiError {
    const fn new(status: StatusCode, code: &'static str) -> Self {
        Self { status, code }
    }

    /// Maps a store error; `operation` names the internal-error code
    /// (e.g. `reorder_failed`).
    fn from_store(err: &TaskStoreError, operation: &'static str) -> Self {
        match err {
            TaskStoreError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "not_found"),
            TaskStoreError::Validation(v) => Self::new(StatusCode::BAD_REQUEST, v.code()),
            _ => {
                tracing::error!(error = %err, operation, "store operation failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, operation)
            }
        }
    }

    fn from_rejection(rejection: &JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type")
            }
            _ => Self::new(StatusCode::BAD_REQUEST, "invalid_json"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody::new(self.code))).into_response()
    }
}

/// Query string of `GET /tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    status: Option<String>,
}

/// Builds the router with CORS for `allowed_origins`.
///
/// Origins that are not valid header values are skipped with a warning.
pub fn router(store: Arc<TaskStore>, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(300));

    Router::new()
        .route("/", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/{id}/reorder", put(reorder_task))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn list_tasks(
    State(store): State<Arc<TaskStore>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<Status>()
                .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "invalid_status"))?,
        ),
    };
    Ok(Json(store.list(status).await))
}

async fn get_task(
    State(store): State<Arc<TaskStore>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    store
        .get(&TaskId::new(id))
        .await
        .map(Json)
        .map_err(|e| ApiError::from_store(&e, "get_failed"))
}

async fn create_task(
    State(store): State<Arc<TaskStore>>,
    body: Result<Json<NewTask>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.map_err(|r| ApiError::from_rejection(&r))?;
    let task = store
        .create(request)
        .await
        .map_err(|e| ApiError::from_store(&e, "create_failed"))?;
    let location = format!("/tasks/{}", task.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(task),
    ))
}

async fn update_task(
    State(store): State<Arc<TaskStore>>,
    Path(id): Path<String>,
    body: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(patch) = body.map_err(|r| ApiError::from_rejection(&r))?;
    store
        .update(&TaskId::new(id), patch)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_store(&e, "update_failed"))
}

async fn delete_task(
    State(store): State<Arc<TaskStore>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    store
        .delete(&TaskId::new(id))
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|e| ApiError::from_store(&e, "delete_failed"))
}

async fn reorder_task(
    State(store): State<Arc<TaskStore>>,
    Path(id): Path<String>,
    body: Result<Json<ReorderRequest>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(request) = body.map_err(|r| ApiError::from_rejection(&r))?;
    store
        .reorder(&TaskId::new(id), request)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_store(&e, "reorder_failed"))
}

/// Starts the store server on `addr` with an empty, memory-only store.
///
/// Returns the actual bound address (useful when binding to port 0) and a
/// join handle for the server task.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_store(addr, Arc::new(TaskStore::new()), &[]).await
}

/// Starts the store server with a pre-built [`TaskStore`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind.
pub async fn start_server_with_store(
    addr: &str,
    store: Arc<TaskStore>,
    allowed_origins: &[String],
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(store, allowed_origins);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "store server error");
        }
    });

    Ok((bound_addr, handle))
}
