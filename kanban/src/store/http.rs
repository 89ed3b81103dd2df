//! REST/JSON client for the task store service.

use std::time::Duration;

use kanban_proto::{ErrorBody, NewTask, ReorderRequest, Status, Task, TaskId, TaskPatch};
use url::Url;

use super::{StoreError, TaskStoreClient};

/// HTTP client for a running task store.
///
/// Non-success responses are turned into [`StoreError::Status`] before any
/// attempt is made to decode a success body.
#[derive(Debug, Clone)]
pub struct HttpTaskStore {
    client: reqwest::Client,
    base: Url,
}

impl HttpTaskStore {
    /// Creates a client for the store at `base_url`.
    ///
    /// `timeout` bounds every request; `None` waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidUrl`] if `base_url` does not parse or is
    /// not an `http`/`https` URL, and [`StoreError::Transport`] if the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, StoreError> {
        let base = Url::parse(base_url).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(StoreError::InvalidUrl(base_url.to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self { client, base })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// One-shot liveness check: `true` if `GET /tasks` succeeds.
    pub async fn ping(&self) -> bool {
        match self.client.get(self.endpoint(&["tasks"])).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "store ping failed");
                false
            }
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn check_response(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let code = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        tracing::warn!(status = status.as_u16(), code = %code, "store request failed");

        Err(StoreError::Status {
            status: status.as_u16(),
            code,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = request.send().await.map_err(transport_error)?;
        self.check_response(response).await
    }

    async fn send_for_task(&self, request: reqwest::RequestBuilder) -> Result<Task, StoreError> {
        let response = self.send(request).await?;
        response
            .json::<Task>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

impl TaskStoreClient for HttpTaskStore {
    async fn list(&self, status: Option<Status>) -> Result<Vec<Task>, StoreError> {
        let mut url = self.endpoint(&["tasks"]);
        if let Some(status) = status {
            url.query_pairs_mut().append_pair("status", status.as_str());
        }

        let response = self.send(self.client.get(url)).await?;
        let records: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(decode_tasks(records))
    }

    async fn get(&self, id: &TaskId) -> Result<Task, StoreError> {
        let url = self.endpoint(&["tasks", id.as_str()]);
        self.send_for_task(self.client.get(url)).await
    }

    async fn create(&self, task: NewTask) -> Result<Task, StoreError> {
        let url = self.endpoint(&["tasks"]);
        self.send_for_task(self.client.post(url).json(&task)).await
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        let url = self.endpoint(&["tasks", id.as_str()]);
        self.send_for_task(self.client.put(url).json(&patch)).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        let url = self.endpoint(&["tasks", id.as_str()]);
        self.send(self.client.delete(url)).await.map(|_| ())
    }

    async fn reorder(&self, id: &TaskId, request: ReorderRequest) -> Result<Task, StoreError> {
        let url = self.endpoint(&["tasks", id.as_str(), "reorder"]);
        self.send_for_task(self.client.put(url).json(&request)).await
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

/// Decodes a task listing record by record, dropping records that do not
/// parse (unknown status, missing fields).
fn decode_tasks(records: Vec<serde_json::Value>) -> Vec<Task> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record
                .get("id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("<missing>")
                .to_string();
            match serde_json::from_value::<Task>(record) {
                Ok(task) => Some(task),
                Err(e) => {
                    tracing::warn!(task_id = %id, error = %e, "dropping undecodable task record");
                    None
                }
            }
        })
        .collect()
}
