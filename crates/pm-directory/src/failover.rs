//! Ordered failover across a backend chain.
//!
//! Shared by the credential orchestrator and the challenge service. Each
//! backend is called at most once, in chain order; the first success or
//! terminal failure ends the walk.

use std::future::Future;
use std::sync::Arc;

use pm_model::Username;

use crate::backend::{BackendChain, DirectoryBackend};
use crate::classify::{ClassifiedError, ErrorClassifier};
use crate::error::{BackendError, BackendResult, PasswordManagerError};

/// How classified failures are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Credential writes: credential and account failures stop the walk.
    Credential,
    /// Attribute reads and writes made with the service account: only
    /// configuration errors stop the walk.
    Lookup,
}

/// Result of walking the chain.
#[derive(Debug)]
pub(crate) enum Outcome<T> {
    /// A backend completed the operation.
    Done(T),
    /// A backend failed in a way no other backend can fix.
    Terminal {
        error: PasswordManagerError,
        /// The failure is the user's doing and counts toward lockout.
        attributable: bool,
    },
    /// Every backend was tried.
    Exhausted {
        /// At least one backend failed for a reason other than not knowing the user.
        transient: bool,
    },
}

/// Error reported when the chain is exhausted.
pub(crate) fn exhausted_error(transient: bool) -> PasswordManagerError {
    if transient {
        PasswordManagerError::BackendUnavailable
    } else {
        PasswordManagerError::UserNotFound
    }
}

enum Step {
    Miss,
    Transient,
    Stop(PasswordManagerError, bool),
}

/// Calls `call` on each backend in order until one settles the request.
pub(crate) async fn try_in_order<T, F, Fut>(
    chain: &BackendChain,
    classifier: &ErrorClassifier,
    mode: Mode,
    operation: &'static str,
    username: &Username,
    mut call: F,
) -> Outcome<T>
where
    F: FnMut(Arc<dyn DirectoryBackend>) -> Fut,
    Fut: Future<Output = BackendResult<T>>,
{
    let mut transient = false;

    for descriptor in chain.iter() {
        let backend = descriptor.description.as_str();
        let result = call(Arc::clone(&descriptor.backend)).await;

        let error = match result {
            Ok(value) => {
                tracing::info!(username = %username, backend, operation, "Directory operation succeeded");
                return Outcome::Done(value);
            }
            Err(error) => error,
        };

        match step(classifier, mode, operation, username, backend, error) {
            Step::Miss => {}
            Step::Transient => transient = true,
            Step::Stop(error, attributable) => {
                return Outcome::Terminal {
                    error,
                    attributable,
                };
            }
        }
    }

    tracing::info!(
        username = %username,
        operation,
        transient,
        backends = chain.len(),
        "No directory completed the operation"
    );
    Outcome::Exhausted { transient }
}

fn step(
    classifier: &ErrorClassifier,
    mode: Mode,
    operation: &'static str,
    username: &Username,
    backend: &str,
    error: BackendError,
) -> Step {
    match error {
        BackendError::UserNotFound => {
            tracing::debug!(username = %username, backend, operation, "User not found in directory");
            Step::Miss
        }
        BackendError::Native { status, diagnostic } => {
            let classified = classifier.classify(status, &diagnostic);
            tracing::debug!(
                username = %username,
                backend,
                operation,
                status,
                diagnostic = %diagnostic,
                classified = ?classified,
                "Directory rejected operation"
            );
            classified_step(mode, operation, username, backend, status, classified)
        }
        BackendError::Unavailable(reason) => {
            tracing::warn!(username = %username, backend, operation, reason = %reason, "Directory unavailable, trying next");
            Step::Transient
        }
        BackendError::NotSupported(what) => {
            tracing::warn!(username = %username, backend, operation, unsupported = %what, "Directory cannot perform operation, trying next");
            Step::Transient
        }
        BackendError::Configuration(reason) => {
            tracing::error!(backend, operation, reason = %reason, "Directory backend misconfigured");
            Step::Stop(PasswordManagerError::Configuration(reason), false)
        }
    }
}

fn classified_step(
    mode: Mode,
    operation: &'static str,
    username: &Username,
    backend: &str,
    status: u32,
    classified: ClassifiedError,
) -> Step {
    if classified == ClassifiedError::UserNotFound {
        tracing::debug!(username = %username, backend, operation, status, "User not found in directory");
        return Step::Miss;
    }

    if mode == Mode::Credential && classified.is_terminal() {
        tracing::info!(username = %username, backend, operation, status, classified = ?classified, "Directory refused credential");
        let error = match classified {
            ClassifiedError::PolicyViolation { reason } => {
                PasswordManagerError::PolicyViolation { reason }
            }
            ClassifiedError::LockedOut => PasswordManagerError::LockedOut { retry_after: None },
            _ => PasswordManagerError::InvalidOldCredential,
        };
        return Step::Stop(error, true);
    }

    tracing::warn!(username = %username, backend, operation, status, classified = ?classified, "Directory operation failed, trying next");
    Step::Transient
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pm_model::SecurityChallenge;
    use secrecy::SecretString;

    use super::*;
    use crate::backend::BackendDescriptor;

    struct Failing(BackendError);

    #[async_trait]
    impl DirectoryBackend for Failing {
        fn description(&self) -> &str {
            "failing"
        }

        async fn change_credential(
            &self,
            _username: &Username,
            _old: &SecretString,
            _new: &SecretString,
        ) -> BackendResult<()> {
            Err(self.0.clone())
        }

        async fn force_set_credential(
            &self,
            _username: &Username,
            _new: &SecretString,
        ) -> BackendResult<()> {
            Err(self.0.clone())
        }

        async fn verify_attribute(
            &self,
            _username: &Username,
            _attribute: &str,
            _expected: &SecretString,
        ) -> BackendResult<bool> {
            Err(self.0.clone())
        }

        async fn fetch_challenge(&self, _username: &Username) -> BackendResult<SecurityChallenge> {
            Err(self.0.clone())
        }
    }

    fn chain(errors: Vec<BackendError>) -> BackendChain {
        BackendChain::new(
            errors
                .into_iter()
                .map(|e| BackendDescriptor::new(Arc::new(Failing(e))))
                .collect(),
        )
        .unwrap()
    }

    async fn walk(chain: &BackendChain, mode: Mode) -> Outcome<()> {
        let classifier = ErrorClassifier::default();
        let username = Username::new("jdoe").unwrap();
        let new = SecretString::from("n3w".to_string());
        try_in_order(chain, &classifier, mode, "test", &username, |backend| {
            let username = username.clone();
            let new = new.clone();
            async move { backend.force_set_credential(&username, &new).await }
        })
        .await
    }

    #[tokio::test]
    async fn misses_exhaust_cleanly() {
        let chain = chain(vec![
            BackendError::UserNotFound,
            BackendError::native(32, "no such object"),
        ]);
        assert!(matches!(
            walk(&chain, Mode::Credential).await,
            Outcome::Exhausted { transient: false }
        ));
    }

    #[tokio::test]
    async fn transient_failure_marks_exhaustion() {
        let chain = chain(vec![
            BackendError::unavailable("connection refused"),
            BackendError::UserNotFound,
        ]);
        assert!(matches!(
            walk(&chain, Mode::Credential).await,
            Outcome::Exhausted { transient: true }
        ));
    }

    #[tokio::test]
    async fn credential_failure_is_terminal_only_in_credential_mode() {
        let chain = chain(vec![
            BackendError::native(19, "00000056: AtrErr"),
            BackendError::UserNotFound,
        ]);
        assert!(matches!(
            walk(&chain, Mode::Credential).await,
            Outcome::Terminal {
                error: PasswordManagerError::InvalidOldCredential,
                attributable: true
            }
        ));
        assert!(matches!(
            walk(&chain, Mode::Lookup).await,
            Outcome::Exhausted { transient: true }
        ));
    }

    #[tokio::test]
    async fn configuration_error_is_terminal_and_not_attributable() {
        let chain = chain(vec![
            BackendError::config("missing question attribute"),
            BackendError::UserNotFound,
        ]);
        assert!(matches!(
            walk(&chain, Mode::Lookup).await,
            Outcome::Terminal {
                error: PasswordManagerError::Configuration(_),
                attributable: false
            }
        ));
    }

    #[test]
    fn exhausted_error_reflects_transient_flag() {
        assert_eq!(exhausted_error(false), PasswordManagerError::UserNotFound);
        assert_eq!(exhausted_error(true), PasswordManagerError::BackendUnavailable);
    }
}
