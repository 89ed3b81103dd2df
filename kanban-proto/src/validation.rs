//! Field validation shared by the client (before any request is sent) and
//! the store (before any mutation is applied).

use thiserror::Error;

/// Maximum title length in characters, after trimming.
pub const MAX_TITLE_LENGTH: usize = 140;

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// A task field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Title is empty once surrounding whitespace is removed.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// Title exceeds [`MAX_TITLE_LENGTH`].
    #[error("task title too long (max {MAX_TITLE_LENGTH} characters)")]
    TitleTooLong,
    /// Description exceeds [`MAX_DESCRIPTION_LENGTH`].
    #[error("task description too long (max {MAX_DESCRIPTION_LENGTH} characters)")]
    DescriptionTooLong,
}

impl ValidationError {
    /// Machine-readable code used in store error bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TitleEmpty | Self::TitleTooLong => "invalid_title",
            Self::DescriptionTooLong => "invalid_description",
        }
    }
}

/// Trims a title and checks its length, returning the trimmed value.
///
/// # Errors
///
/// Returns [`ValidationError::TitleEmpty`] or [`ValidationError::TitleTooLong`].
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(trimmed.to_string())
}

/// Trims a description, mapping blank input to `None`.
///
/// # Errors
///
/// Returns [`ValidationError::DescriptionTooLong`].
pub fn validate_description(description: &str) -> Result<Option<String>, ValidationError> {
    let trimmed = description.trim();
    if trimmed.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::DescriptionTooLong);
    }
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}
