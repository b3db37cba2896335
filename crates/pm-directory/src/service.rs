//! Password manager facade.
//!
//! Bundles the credential orchestrator and challenge service over one backend
//! chain, and adds the challenge-then-reset flow.

use std::sync::Arc;

use pm_lockout::AttemptLimiter;
use pm_model::SecurityChallenge;
use secrecy::SecretString;

use crate::backend::BackendChain;
use crate::challenge::SecurityChallengeService;
use crate::classify::ErrorClassifier;
use crate::error::PmResult;
use crate::orchestrator::CredentialOrchestrator;

/// Entry point for password change, reset and security questions.
#[derive(Debug, Clone)]
pub struct PasswordManager {
    credentials: CredentialOrchestrator,
    challenges: SecurityChallengeService,
    limiter: Arc<AttemptLimiter>,
}

impl PasswordManager {
    /// Creates a password manager over `chain`.
    #[must_use]
    pub fn new(
        chain: BackendChain,
        limiter: Arc<AttemptLimiter>,
        classifier: Arc<ErrorClassifier>,
    ) -> Self {
        Self {
            credentials: CredentialOrchestrator::new(
                chain.clone(),
                Arc::clone(&limiter),
                Arc::clone(&classifier),
            ),
            challenges: SecurityChallengeService::new(chain, classifier),
            limiter,
        }
    }

    /// The credential orchestrator.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialOrchestrator {
        &self.credentials
    }

    /// The challenge service.
    #[must_use]
    pub const fn challenges(&self) -> &SecurityChallengeService {
        &self.challenges
    }

    /// See [`CredentialOrchestrator::change_credential`].
    ///
    /// # Errors
    ///
    /// See [`CredentialOrchestrator::change_credential`].
    pub async fn change_password(
        &self,
        username: &str,
        old: &SecretString,
        new: &SecretString,
    ) -> PmResult<()> {
        self.credentials.change_credential(username, old, new).await
    }

    /// See [`SecurityChallengeService::get_challenge`].
    ///
    /// # Errors
    ///
    /// See [`SecurityChallengeService::get_challenge`].
    pub async fn security_challenge(&self, username: &str) -> PmResult<SecurityChallenge> {
        self.challenges.get_challenge(username).await
    }

    /// Resets a password after checking the answers of `challenge`.
    ///
    /// Wrong answers count toward the user's lockout; a successful reset
    /// clears it. Returns `Ok(false)` and changes nothing if an answer is wrong.
    ///
    /// # Errors
    ///
    /// `LockedOut` if the user is locked out, otherwise as for
    /// [`SecurityChallengeService::verify_challenge`] and
    /// [`CredentialOrchestrator::set_credential`].
    pub async fn reset_password(
        &self,
        challenge: &SecurityChallenge,
        new: &SecretString,
    ) -> PmResult<bool> {
        let username = challenge.username();
        let permit = self.limiter.permit(username)?;

        if !self.challenges.verify_challenge(challenge).await? {
            let failures = permit.record_failure();
            tracing::info!(username = %username, failures, "Password reset refused: wrong security answer");
            return Ok(false);
        }

        self.credentials.set_credential_for(username, new).await?;
        permit.succeed();
        tracing::info!(username = %username, "Password reset after security challenge");
        Ok(true)
    }
}
