//! LDAP-specific error types.
//!
//! ## Security Note
//!
//! Error messages must not leak sensitive information like
//! passwords, bind credentials, security answers or native diagnostics.

use pm_directory::BackendError;
use thiserror::Error;

/// LDAP-specific errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LdapError {
    /// Invalid configuration.
    #[error("LDAP configuration error: {0}")]
    Configuration(String),

    /// Connection URL must use LDAPS.
    #[error(
        "Security error: Only LDAPS is supported. URL must start with 'ldaps://'. STARTTLS and plain LDAP are not allowed."
    )]
    InsecureProtocol,

    /// Connection failed.
    #[error("LDAP connection failed: {0}")]
    Connection(String),

    /// Service account bind failed.
    #[error("LDAP service bind failed")]
    ServiceBind,

    /// The server returned a non-success result.
    #[error("LDAP server returned result code {code}")]
    Native {
        /// LDAP result code.
        code: u32,
        /// Diagnostic message returned by the server.
        text: String,
    },

    /// No entry matches the username.
    #[error("User not found")]
    UserNotFound,

    /// More than one entry matches the username.
    #[error("Username matches {0} entries")]
    AmbiguousUser(usize),

    /// A configured attribute is missing from the user's entry.
    #[error("Attribute '{0}' not found on user entry")]
    MissingAttribute(String),

    /// All connection slots are in use and the backend is shutting down.
    #[error("Connection limit closed")]
    ConnectionLimit,
}

impl LdapError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a native result error.
    #[must_use]
    pub fn native(code: u32, text: impl Into<String>) -> Self {
        Self::Native {
            code,
            text: text.into(),
        }
    }

    /// Returns the native result code, if the server produced one.
    #[must_use]
    pub const fn code(&self) -> Option<u32> {
        match self {
            Self::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<ldap3::LdapError> for LdapError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => Self::Native {
                code: result.rc,
                text: result.text,
            },
            other => Self::Connection(other.to_string()),
        }
    }
}

/// Result type for LDAP operations.
pub type LdapResult<T> = Result<T, LdapError>;

impl From<LdapError> for BackendError {
    fn from(err: LdapError) -> Self {
        match err {
            LdapError::Configuration(msg) => Self::Configuration(msg),
            LdapError::InsecureProtocol | LdapError::AmbiguousUser(_) | LdapError::MissingAttribute(_) => {
                Self::Configuration(err.to_string())
            }
            LdapError::Connection(msg) => Self::Unavailable(msg),
            LdapError::ServiceBind | LdapError::ConnectionLimit => Self::Unavailable(err.to_string()),
            LdapError::Native { code, text } => Self::Native {
                status: code,
                diagnostic: text,
            },
            LdapError::UserNotFound => Self::UserNotFound,
        }
    }
}
