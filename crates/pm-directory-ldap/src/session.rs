//! Connection seam between the backends and the wire.
//!
//! [`DirectoryConnector::open`] hands out one session bound with the
//! service account. A session is used for a single backend operation and
//! then closed; it is never shared or returned to a pool.

use async_trait::async_trait;

use crate::error::LdapResult;
use crate::search::{LdapEntry, SearchScope};

/// One change in a modify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeChange {
    /// Add values to an attribute.
    Add {
        /// Attribute name.
        attribute: String,
        /// Values to add.
        values: Vec<Vec<u8>>,
    },
    /// Remove values from an attribute. The request fails if a value is absent.
    Delete {
        /// Attribute name.
        attribute: String,
        /// Values to remove.
        values: Vec<Vec<u8>>,
    },
    /// Replace all values of an attribute.
    Replace {
        /// Attribute name.
        attribute: String,
        /// New values.
        values: Vec<Vec<u8>>,
    },
}

impl AttributeChange {
    /// Creates a single-valued replace.
    #[must_use]
    pub fn replace(attribute: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::Replace {
            attribute: attribute.into(),
            values: vec![value.into()],
        }
    }

    /// The attribute this change applies to.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Self::Add { attribute, .. }
            | Self::Delete { attribute, .. }
            | Self::Replace { attribute, .. } => attribute,
        }
    }
}

/// Opens sessions against one directory.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Opens a session bound with the service account.
    ///
    /// Implementations bound the number of simultaneously open sessions;
    /// this call waits for a free slot.
    async fn open(&self) -> LdapResult<Box<dyn DirectorySession>>;
}

/// An open, bound connection.
///
/// Dropping a session releases its connection slot even if
/// [`close`](Self::close) was not called.
#[async_trait]
pub trait DirectorySession: Send {
    /// Searches below `base` and returns the matching entries with the
    /// requested attributes.
    async fn search_entry(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> LdapResult<Vec<LdapEntry>>;

    /// Applies all changes to `dn` in a single request.
    async fn modify(&mut self, dn: &str, changes: Vec<AttributeChange>) -> LdapResult<()>;

    /// Compares an attribute value. A mismatch is `Ok(false)`.
    async fn compare(&mut self, dn: &str, attribute: &str, value: &[u8]) -> LdapResult<bool>;

    /// RFC 3062 Password Modify extended operation.
    async fn password_modify(&mut self, dn: &str, old: Option<&str>, new: &str) -> LdapResult<()>;

    /// Re-binds the session as `dn`.
    async fn bind(&mut self, dn: &str, password: &str) -> LdapResult<()>;

    /// Unbinds and closes the connection.
    async fn close(&mut self) -> LdapResult<()>;
}
