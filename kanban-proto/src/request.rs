//! Request and error bodies of the task store's REST interface.

use serde::{Deserialize, Deserializer, Serialize};

use crate::task::Status;
use crate::validation::{ValidationError, validate_description, validate_title};

/// Body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Task title.
    pub title: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Column to create the task in; the store defaults to `todo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl NewTask {
    /// Creates a request for a task with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the starting column.
    #[must_use]
    pub const fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Validates and normalises the request: the title is trimmed and a
    /// blank description is dropped.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validated(self) -> Result<Self, ValidationError> {
        let title = validate_title(&self.title)?;
        let description = match self.description {
            Some(d) => validate_description(&d)?,
            None => None,
        };
        Ok(Self {
            title,
            description,
            status: self.status,
        })
    }
}

/// Body of `PUT /tasks/{id}`: every field is optional.
///
/// An empty `description` clears the stored description. A `status` change
/// moves the task to the bottom of the new column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description (empty string clears it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl TaskPatch {
    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }

    /// Validates and normalises the patch.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validated(self) -> Result<Self, ValidationError> {
        let title = self.title.as_deref().map(validate_title).transpose()?;
        let description = self
            .description
            .as_deref()
            .map(|d| validate_description(d).map(Option::unwrap_or_default))
            .transpose()?;
        Ok(Self {
            title,
            description,
            status: self.status,
        })
    }
}

/// Body of `PUT /tasks/{id}/reorder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderRequest {
    /// Destination column.
    pub status: Status,
    /// 0-based insertion index within the destination column.
    ///
    /// Negative indexes on the wire are read as 0.
    #[serde(deserialize_with = "index_at_least_zero")]
    pub index: usize,
}

fn index_at_least_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(usize::try_from(raw.max(0)).unwrap_or(usize::MAX))
}

/// Body of every non-success store response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code, e.g. `not_found`.
    pub error: String,
}

impl ErrorBody {
    /// Creates an error body with the given code.
    pub fn new(code: impl Into<String>) -> Self {
        Self { error: code.into() }
    }
}
