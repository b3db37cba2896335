//! Directory error types.
//!
//! ## Security Note
//!
//! Display strings never include native directory diagnostics, credentials or
//! security answers. Diagnostics are kept on [`BackendError::Native`] for the
//! classifier and for debug logging only.

use std::time::Duration;

use pm_lockout::LockedOut;
use pm_model::ModelError;
use thiserror::Error;

/// Failure reported by a single directory backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend has no entry for the user.
    #[error("user not found")]
    UserNotFound,

    /// The directory rejected the operation.
    #[error("directory returned status {status}")]
    Native {
        /// Native result code.
        status: u32,
        /// Free-text diagnostic returned by the directory.
        diagnostic: String,
    },

    /// The directory could not be reached or the connection failed.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The backend's configuration or entry data is structurally wrong.
    #[error("backend configuration error: {0}")]
    Configuration(String),

    /// The backend does not implement this operation.
    #[error("operation not supported: {0}")]
    NotSupported(String),
}

impl BackendError {
    /// Creates a native error.
    #[must_use]
    pub fn native(status: u32, diagnostic: impl Into<String>) -> Self {
        Self::Native {
            status,
            diagnostic: diagnostic.into(),
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a not supported error.
    #[must_use]
    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported(operation.into())
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors returned to callers of the password manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordManagerError {
    /// Username was empty.
    #[error("username cannot be empty")]
    InvalidUsername,

    /// Too many failed attempts.
    #[error("too many failed attempts; try again later")]
    LockedOut {
        /// Time until the lock lifts, if known.
        retry_after: Option<Duration>,
    },

    /// The old password did not match.
    #[error("username/password combination incorrect")]
    InvalidOldCredential,

    /// The directory rejected the new password.
    #[error("new password does not meet the password policy")]
    PolicyViolation {
        /// Human-safe explanation, when one is known.
        reason: Option<String>,
    },

    /// No backend knows the user.
    #[error("user not found")]
    UserNotFound,

    /// Every backend that was tried failed for reasons unrelated to the user.
    #[error("no directory could complete the request")]
    BackendUnavailable,

    /// Configuration or directory data is wrong.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A security question was submitted without an answer.
    #[error("security question has no answer")]
    MissingAnswer,
}

impl PasswordManagerError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<LockedOut> for PasswordManagerError {
    fn from(err: LockedOut) -> Self {
        Self::LockedOut {
            retry_after: err.retry_after,
        }
    }
}

impl From<ModelError> for PasswordManagerError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::EmptyUsername => Self::InvalidUsername,
            ModelError::EmptyChallenge | ModelError::UnknownQuestion(_) => {
                Self::Configuration(err.to_string())
            }
        }
    }
}

/// Result type for password manager operations.
pub type PmResult<T> = Result<T, PasswordManagerError>;

/// Errors building an [`ErrorClassifier`](crate::ErrorClassifier).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    /// The diagnostic pattern does not compile.
    #[error("invalid diagnostic pattern: {0}")]
    InvalidPattern(String),

    /// The diagnostic pattern has no `sub_code` capture group.
    #[error("diagnostic pattern must define a `sub_code` capture group")]
    MissingSubCodeGroup,

    /// A rule's sub-code is not eight hexadecimal digits.
    #[error("invalid sub-code '{0}': expected 8 hexadecimal digits")]
    InvalidSubCode(String),
}
