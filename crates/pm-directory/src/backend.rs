//! Directory backend trait and the ordered backend chain.
//!
//! A backend is one directory (Active Directory domain, OpenLDAP tree, ...)
//! that holds credentials and security answers for some subset of users.
//! The chain is the failover order, fixed when the service is built.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use pm_model::{SecurityChallenge, Username};
use secrecy::SecretString;

use crate::error::{BackendError, BackendResult, PasswordManagerError, PmResult};

// ============================================================================
// Directory Backend
// ============================================================================

/// One directory capable of credential and attribute operations.
///
/// ## Implementation Notes
///
/// - Each call acquires its own connection and releases it on every exit path
/// - A user unknown to this backend is reported as [`BackendError::UserNotFound`]
/// - Directory rejections are reported as [`BackendError::Native`] and left to
///   the classifier; implementations do not interpret result codes themselves
/// - Credentials and answers must never be logged
#[async_trait]
pub trait DirectoryBackend: Send + Sync {
    /// Human-readable name used in logs.
    fn description(&self) -> &str;

    /// Changes a password, verifying the old one.
    ///
    /// Must not change anything if the old password is wrong.
    async fn change_credential(
        &self,
        username: &Username,
        old: &SecretString,
        new: &SecretString,
    ) -> BackendResult<()>;

    /// Sets a password without checking the old one.
    async fn force_set_credential(&self, username: &Username, new: &SecretString)
    -> BackendResult<()>;

    /// Compares an attribute of the user's entry with `expected`.
    ///
    /// A mismatch is `Ok(false)`, not an error.
    async fn verify_attribute(
        &self,
        username: &Username,
        attribute: &str,
        expected: &SecretString,
    ) -> BackendResult<bool>;

    /// Builds the user's security challenge.
    ///
    /// Default questions come first in configured order, followed by the
    /// user's custom questions.
    async fn fetch_challenge(&self, username: &Username) -> BackendResult<SecurityChallenge>;

    /// Stores the answers (and custom prompts) of a security challenge.
    async fn store_challenge(
        &self,
        _username: &Username,
        _challenge: &SecurityChallenge,
    ) -> BackendResult<()> {
        Err(BackendError::not_supported("store security challenge"))
    }
}

// ============================================================================
// Backend Chain
// ============================================================================

/// A backend together with the description used in logs.
#[derive(Clone)]
pub struct BackendDescriptor {
    /// The backend.
    pub backend: Arc<dyn DirectoryBackend>,

    /// Description for logs and diagnostics.
    pub description: String,
}

impl BackendDescriptor {
    /// Wraps a backend, using its own description.
    #[must_use]
    pub fn new(backend: Arc<dyn DirectoryBackend>) -> Self {
        let description = backend.description().to_string();
        Self {
            backend,
            description,
        }
    }

    /// Overrides the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Ordered, immutable list of backends.
///
/// Order is the failover priority. Clones share the same list.
#[derive(Debug, Clone)]
pub struct BackendChain {
    backends: Arc<[BackendDescriptor]>,
}

impl BackendChain {
    /// Creates a chain.
    ///
    /// # Errors
    ///
    /// At least one backend is required.
    pub fn new(backends: Vec<BackendDescriptor>) -> PmResult<Self> {
        if backends.is_empty() {
            return Err(PasswordManagerError::config(
                "at least one directory backend must be configured",
            ));
        }
        Ok(Self {
            backends: backends.into(),
        })
    }

    /// Iterates backends in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.backends.iter()
    }

    /// Number of backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Always false for a constructed chain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Backend descriptions in priority order.
    #[must_use]
    pub fn descriptions(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.description.as_str()).collect()
    }
}
