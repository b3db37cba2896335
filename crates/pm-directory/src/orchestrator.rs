//! Credential change orchestration.
//!
//! One logical attempt is:
//!
//! ```text
//! validate username -> limiter permit -> backend[0] -> backend[1] -> ...
//! ```
//!
//! The limiter is consulted once before any backend and settled once after
//! the walk, however many backends were tried.

use std::sync::Arc;

use pm_lockout::AttemptLimiter;
use pm_model::Username;
use secrecy::{ExposeSecret, SecretString};

use crate::backend::BackendChain;
use crate::classify::ErrorClassifier;
use crate::error::{PasswordManagerError, PmResult};
use crate::failover::{Mode, Outcome, exhausted_error, try_in_order};

/// Changes and resets credentials across an ordered backend chain.
#[derive(Debug, Clone)]
pub struct CredentialOrchestrator {
    chain: BackendChain,
    limiter: Arc<AttemptLimiter>,
    classifier: Arc<ErrorClassifier>,
}

impl CredentialOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub const fn new(
        chain: BackendChain,
        limiter: Arc<AttemptLimiter>,
        classifier: Arc<ErrorClassifier>,
    ) -> Self {
        Self {
            chain,
            limiter,
            classifier,
        }
    }

    /// The backend chain.
    #[must_use]
    pub const fn chain(&self) -> &BackendChain {
        &self.chain
    }

    /// The attempt limiter.
    #[must_use]
    pub fn limiter(&self) -> &AttemptLimiter {
        &self.limiter
    }

    /// Changes a user's password, verifying the old one.
    ///
    /// # Errors
    ///
    /// - `InvalidUsername` for an empty username (nothing is contacted)
    /// - `LockedOut` when the limiter refuses the attempt (no backend is contacted)
    /// - `InvalidOldCredential` for an empty old password, counted as a
    ///   failure without contacting a backend
    /// - `InvalidOldCredential`, `PolicyViolation` or `LockedOut` from the
    ///   first backend that knows the user
    /// - `UserNotFound` or `BackendUnavailable` when the chain is exhausted
    /// - `Configuration` when a backend is misconfigured
    pub async fn change_credential(
        &self,
        username: &str,
        old: &SecretString,
        new: &SecretString,
    ) -> PmResult<()> {
        let username = Username::new(username)?;
        self.change_credential_for(&username, old, new).await
    }

    /// Same as [`change_credential`](Self::change_credential) for an
    /// already-validated username.
    ///
    /// # Errors
    ///
    /// See [`change_credential`](Self::change_credential).
    pub async fn change_credential_for(
        &self,
        username: &Username,
        old: &SecretString,
        new: &SecretString,
    ) -> PmResult<()> {
        let permit = self.limiter.permit(username)?;

        // An empty simple bind is anonymous and would verify nothing.
        if old.expose_secret().is_empty() {
            let failures = permit.record_failure();
            tracing::warn!(username = %username, failures, "Rejected empty old password");
            return Err(PasswordManagerError::InvalidOldCredential);
        }

        let outcome = try_in_order(
            &self.chain,
            &self.classifier,
            Mode::Credential,
            "change_credential",
            username,
            move |backend| async move { backend.change_credential(username, old, new).await },
        )
        .await;

        match outcome {
            Outcome::Done(()) => {
                permit.succeed();
                Ok(())
            }
            Outcome::Terminal {
                error,
                attributable: true,
            } => {
                permit.record_failure();
                Err(error)
            }
            Outcome::Terminal { error, .. } => {
                drop(permit);
                Err(error)
            }
            Outcome::Exhausted { transient } => {
                permit.record_failure();
                Err(exhausted_error(transient))
            }
        }
    }

    /// Sets a user's password without the old one.
    ///
    /// Intended for resets after a successful security challenge. The limiter
    /// is not consulted.
    ///
    /// # Errors
    ///
    /// As for [`change_credential`](Self::change_credential), except
    /// `LockedOut` from the limiter.
    pub async fn set_credential(&self, username: &str, new: &SecretString) -> PmResult<()> {
        let username = Username::new(username)?;
        self.set_credential_for(&username, new).await
    }

    /// Same as [`set_credential`](Self::set_credential) for an
    /// already-validated username.
    ///
    /// # Errors
    ///
    /// See [`set_credential`](Self::set_credential).
    pub async fn set_credential_for(&self, username: &Username, new: &SecretString) -> PmResult<()> {
        let outcome = try_in_order(
            &self.chain,
            &self.classifier,
            Mode::Credential,
            "set_credential",
            username,
            move |backend| async move { backend.force_set_credential(username, new).await },
        )
        .await;

        match outcome {
            Outcome::Done(()) => Ok(()),
            Outcome::Terminal { error, .. } => Err(error),
            Outcome::Exhausted { transient } => Err(exhausted_error(transient)),
        }
    }
}
