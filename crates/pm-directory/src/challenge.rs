//! Security challenge retrieval and verification.
//!
//! All operations run with the backends' service accounts, so only a
//! misconfigured backend stops the failover walk. The attempt limiter is not
//! consulted here.

use std::sync::Arc;

use pm_model::{ChallengeQuestion, SecurityChallenge, Username};

use crate::backend::BackendChain;
use crate::classify::ErrorClassifier;
use crate::error::{PasswordManagerError, PmResult};
use crate::failover::{Mode, Outcome, exhausted_error, try_in_order};

/// Reads, checks and stores security questions across a backend chain.
#[derive(Debug, Clone)]
pub struct SecurityChallengeService {
    chain: BackendChain,
    classifier: Arc<ErrorClassifier>,
}

impl SecurityChallengeService {
    /// Creates a challenge service.
    #[must_use]
    pub const fn new(chain: BackendChain, classifier: Arc<ErrorClassifier>) -> Self {
        Self { chain, classifier }
    }

    /// Returns the security challenge of the first backend that knows the user.
    ///
    /// # Errors
    ///
    /// `InvalidUsername`, `UserNotFound`, `BackendUnavailable`, or
    /// `Configuration` when the user's entry lacks a configured custom
    /// question attribute.
    pub async fn get_challenge(&self, username: &str) -> PmResult<SecurityChallenge> {
        let username = Username::new(username)?;
        let username = &username;

        let outcome = try_in_order(
            &self.chain,
            &self.classifier,
            Mode::Lookup,
            "get_challenge",
            username,
            move |backend| async move { backend.fetch_challenge(username).await },
        )
        .await;

        settle(outcome)
    }

    /// Checks one answered question.
    ///
    /// The first backend that knows the user decides.
    ///
    /// # Errors
    ///
    /// `MissingAnswer` if the question carries no answer, otherwise as for
    /// [`get_challenge`](Self::get_challenge).
    pub async fn verify_answer(&self, username: &str, question: &ChallengeQuestion) -> PmResult<bool> {
        let username = Username::new(username)?;
        self.verify_question(&username, question).await
    }

    /// Checks every question of an answered challenge, in order.
    ///
    /// Stops at the first wrong answer.
    ///
    /// # Errors
    ///
    /// `MissingAnswer` if any question is unanswered, otherwise as for
    /// [`verify_answer`](Self::verify_answer).
    pub async fn verify_challenge(&self, challenge: &SecurityChallenge) -> PmResult<bool> {
        if !challenge.is_fully_answered() {
            return Err(PasswordManagerError::MissingAnswer);
        }

        for question in challenge.questions() {
            if !self.verify_question(challenge.username(), question).await? {
                tracing::info!(
                    username = %challenge.username(),
                    attribute = %question.answer_attribute,
                    "Security answer rejected"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Stores the answers of a challenge in the first backend that knows the user.
    ///
    /// # Errors
    ///
    /// `MissingAnswer` if no question is answered, otherwise as for
    /// [`get_challenge`](Self::get_challenge).
    pub async fn store_challenge(&self, challenge: &SecurityChallenge) -> PmResult<()> {
        if !challenge.questions().iter().any(ChallengeQuestion::is_answered) {
            return Err(PasswordManagerError::MissingAnswer);
        }
        let username = challenge.username();

        let outcome = try_in_order(
            &self.chain,
            &self.classifier,
            Mode::Lookup,
            "store_challenge",
            username,
            move |backend| async move { backend.store_challenge(username, challenge).await },
        )
        .await;

        settle(outcome)
    }

    async fn verify_question(&self, username: &Username, question: &ChallengeQuestion) -> PmResult<bool> {
        let answer = match question.answer() {
            Some(answer) if question.is_answered() => answer,
            _ => return Err(PasswordManagerError::MissingAnswer),
        };
        let attribute = question.answer_attribute.as_str();

        let outcome = try_in_order(
            &self.chain,
            &self.classifier,
            Mode::Lookup,
            "verify_answer",
            username,
            move |backend| async move { backend.verify_attribute(username, attribute, answer).await },
        )
        .await;

        settle(outcome)
    }
}

fn settle<T>(outcome: Outcome<T>) -> PmResult<T> {
    match outcome {
        Outcome::Done(value) => Ok(value),
        Outcome::Terminal { error, .. } => Err(error),
        Outcome::Exhausted { transient } => Err(exhausted_error(transient)),
    }
}
