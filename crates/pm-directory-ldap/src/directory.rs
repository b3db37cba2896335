//! LDAP directory backend.
//!
//! ## Security Requirements
//!
//! - All connections use LDAPS (TLS from connection start)
//! - Passwords and security answers are never logged
//! - Only configured answer attributes can be compared or written

use std::sync::Arc;

use async_trait::async_trait;
use pm_directory::{
    BackendChain, BackendDescriptor, BackendError, BackendResult, DirectoryBackend,
    PasswordManagerError, PmResult,
};
use pm_model::{ChallengeQuestion, SecurityChallenge, Username};
use secrecy::{ExposeSecret, SecretString};

use crate::config::{LdapBackendConfig, LdapVendor};
use crate::connection::LdapConnector;
use crate::error::{LdapError, LdapResult};
use crate::search::{LdapEntry, SearchScope};
use crate::session::{AttributeChange, DirectoryConnector, DirectorySession};
use crate::{active_directory, generic};

const NO_SUCH_ATTRIBUTE: u32 = 16;

/// One LDAP directory.
///
/// Every operation opens a session through the connector, resolves the
/// user's DN with the service account, performs its work and closes the
/// session before returning.
pub struct LdapDirectory {
    config: Arc<LdapBackendConfig>,
    connector: Arc<dyn DirectoryConnector>,
}

impl LdapDirectory {
    /// Creates a directory using a custom connector.
    ///
    /// ## Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: LdapBackendConfig,
        connector: Arc<dyn DirectoryConnector>,
    ) -> LdapResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            connector,
        })
    }

    /// Creates a directory connecting over LDAPS with `ldap3`.
    ///
    /// No connection is made until the first operation.
    ///
    /// ## Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn connect(config: LdapBackendConfig) -> LdapResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let connector = Arc::new(LdapConnector::new(Arc::clone(&config)));
        Ok(Self { config, connector })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LdapBackendConfig {
        &self.config
    }

    /// Finds the user's entry below `users_dn`, with the given attributes.
    async fn find_user(
        &self,
        session: &mut dyn DirectorySession,
        username: &Username,
        attributes: &[&str],
    ) -> LdapResult<LdapEntry> {
        let filter = self.config.user_by_username_filter(username.as_str());
        let attributes = if attributes.is_empty() { &["1.1"][..] } else { attributes };
        let mut entries = session
            .search_entry(&self.config.users_dn, SearchScope::Subtree, &filter, attributes)
            .await?;

        match entries.len() {
            0 => Err(LdapError::UserNotFound),
            1 => {
                let entry = entries.remove(0);
                tracing::debug!(
                    backend = %self.config.description,
                    username = %username,
                    dn = %entry.dn,
                    "Resolved user DN"
                );
                Ok(entry)
            }
            n => {
                tracing::error!(
                    backend = %self.config.description,
                    username = %username,
                    matches = n,
                    "Username matches several entries"
                );
                Err(LdapError::AmbiguousUser(n))
            }
        }
    }

    async fn user_dn(
        &self,
        session: &mut dyn DirectorySession,
        username: &Username,
    ) -> LdapResult<String> {
        Ok(self.find_user(session, username, &[]).await?.dn)
    }

    /// Closes the session and passes `result` through.
    async fn finish<T>(
        &self,
        mut session: Box<dyn DirectorySession>,
        result: LdapResult<T>,
    ) -> BackendResult<T> {
        if let Err(e) = session.close().await {
            tracing::debug!(backend = %self.config.description, error = %e, "Unbind failed");
        }
        result.map_err(BackendError::from)
    }

    fn require_question(&self, attribute: &str) -> LdapResult<()> {
        if self.config.has_question(attribute) {
            Ok(())
        } else {
            Err(LdapError::config(format!(
                "'{attribute}' is not a configured answer attribute"
            )))
        }
    }

    async fn change_in(
        &self,
        session: &mut dyn DirectorySession,
        username: &Username,
        old: &SecretString,
        new: &SecretString,
    ) -> LdapResult<()> {
        let dn = self.user_dn(session, username).await?;
        let (old, new) = (old.expose_secret(), new.expose_secret());
        match self.config.vendor {
            LdapVendor::ActiveDirectory => {
                active_directory::change_password(
                    session,
                    self.config.password_attribute(),
                    &dn,
                    old,
                    new,
                )
                .await
            }
            LdapVendor::Generic => generic::change_password(session, &self.config, &dn, old, new).await,
        }
    }

    async fn set_in(
        &self,
        session: &mut dyn DirectorySession,
        username: &Username,
        new: &SecretString,
    ) -> LdapResult<()> {
        let dn = self.user_dn(session, username).await?;
        let new = new.expose_secret();
        match self.config.vendor {
            LdapVendor::ActiveDirectory => {
                active_directory::set_password(session, self.config.password_attribute(), &dn, new)
                    .await
            }
            LdapVendor::Generic => generic::set_password(session, &self.config, &dn, new).await,
        }
    }

    async fn verify_in(
        &self,
        session: &mut dyn DirectorySession,
        username: &Username,
        attribute: &str,
        expected: &SecretString,
    ) -> LdapResult<bool> {
        let dn = self.user_dn(session, username).await?;
        self.require_question(attribute)?;
        match session
            .compare(&dn, attribute, expected.expose_secret().as_bytes())
            .await
        {
            Ok(equal) => Ok(equal),
            Err(e) if e.code() == Some(NO_SUCH_ATTRIBUTE) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn fetch_in(
        &self,
        session: &mut dyn DirectorySession,
        username: &Username,
    ) -> LdapResult<SecurityChallenge> {
        let prompts: Vec<&str> = self
            .config
            .custom_questions
            .iter()
            .map(|q| q.question_attribute.as_str())
            .collect();
        let entry = self.find_user(session, username, &prompts).await?;

        let mut questions: Vec<ChallengeQuestion> = self
            .config
            .default_questions
            .iter()
            .map(|q| ChallengeQuestion::new(q.prompt.clone(), q.answer_attribute.clone()))
            .collect();
        for custom in &self.config.custom_questions {
            let prompt = entry
                .get_attr(&custom.question_attribute)
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| LdapError::MissingAttribute(custom.question_attribute.clone()))?;
            questions.push(ChallengeQuestion::new(prompt, custom.answer_attribute.clone()));
        }

        SecurityChallenge::new(username.clone(), questions)
            .map_err(|_| LdapError::config("no security questions configured"))
    }

    async fn store_in(
        &self,
        session: &mut dyn DirectorySession,
        username: &Username,
        challenge: &SecurityChallenge,
    ) -> LdapResult<()> {
        let dn = self.user_dn(session, username).await?;

        let mut changes = Vec::new();
        for question in challenge.questions() {
            let Some(answer) = question.answer().filter(|_| question.is_answered()) else {
                continue;
            };
            self.require_question(&question.answer_attribute)?;
            changes.push(AttributeChange::replace(
                question.answer_attribute.clone(),
                answer.expose_secret().as_bytes(),
            ));
            if let Some(custom) = self.config.custom_question(&question.answer_attribute) {
                changes.push(AttributeChange::replace(
                    custom.question_attribute.clone(),
                    question.prompt.as_bytes(),
                ));
            }
        }
        if changes.is_empty() {
            return Ok(());
        }

        let written = changes.len();
        session.modify(&dn, changes).await?;
        tracing::debug!(
            backend = %self.config.description,
            username = %username,
            attributes = written,
            "Stored security answers"
        );
        Ok(())
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("description", &self.config.description)
            .field("vendor", &self.config.vendor)
            .field("users_dn", &self.config.users_dn)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DirectoryBackend for LdapDirectory {
    fn description(&self) -> &str {
        &self.config.description
    }

    async fn change_credential(
        &self,
        username: &Username,
        old: &SecretString,
        new: &SecretString,
    ) -> BackendResult<()> {
        let mut session = self.connector.open().await?;
        let result = self.change_in(session.as_mut(), username, old, new).await;
        self.finish(session, result).await
    }

    async fn force_set_credential(
        &self,
        username: &Username,
        new: &SecretString,
    ) -> BackendResult<()> {
        let mut session = self.connector.open().await?;
        let result = self.set_in(session.as_mut(), username, new).await;
        self.finish(session, result).await
    }

    async fn verify_attribute(
        &self,
        username: &Username,
        attribute: &str,
        expected: &SecretString,
    ) -> BackendResult<bool> {
        let mut session = self.connector.open().await?;
        let result = self
            .verify_in(session.as_mut(), username, attribute, expected)
            .await;
        self.finish(session, result).await
    }

    async fn fetch_challenge(&self, username: &Username) -> BackendResult<SecurityChallenge> {
        let mut session = self.connector.open().await?;
        let result = self.fetch_in(session.as_mut(), username).await;
        self.finish(session, result).await
    }

    async fn store_challenge(
        &self,
        username: &Username,
        challenge: &SecurityChallenge,
    ) -> BackendResult<()> {
        let mut session = self.connector.open().await?;
        let result = self.store_in(session.as_mut(), username, challenge).await;
        self.finish(session, result).await
    }
}

/// Builds a failover chain from backend configurations, in order.
///
/// # Errors
///
/// Returns a configuration error naming the first invalid backend, or if
/// `configs` is empty.
pub fn backend_chain(configs: Vec<LdapBackendConfig>) -> PmResult<BackendChain> {
    let backends = configs
        .into_iter()
        .enumerate()
        .map(|(index, config)| {
            let description = config.description.clone();
            LdapDirectory::connect(config)
                .map(|directory| {
                    BackendDescriptor::new(Arc::new(directory)).with_description(description.clone())
                })
                .map_err(|e| {
                    PasswordManagerError::config(format!("backend #{} ({description}): {e}", index + 1))
                })
        })
        .collect::<PmResult<Vec<_>>>()?;

    BackendChain::new(backends)
}
