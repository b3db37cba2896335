//! Model validation errors.

use thiserror::Error;

/// Errors raised when constructing model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Username was empty or blank.
    #[error("username cannot be empty")]
    EmptyUsername,

    /// A security challenge needs at least one question.
    #[error("security challenge must contain at least one question")]
    EmptyChallenge,

    /// No question in the challenge uses the given answer attribute.
    #[error("no challenge question uses answer attribute '{0}'")]
    UnknownQuestion(String),
}

/// Result type for model construction.
pub type ModelResult<T> = Result<T, ModelError>;
