//! `ldap3` connector.
//!
//! ## Security Requirements
//!
//! All connections use LDAPS (TLS from connection start).
//! STARTTLS is NOT supported to prevent downgrade attacks.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::exop::PasswordModify;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Mod, SearchEntry};
use secrecy::ExposeSecret;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::LdapBackendConfig;
use crate::error::{LdapError, LdapResult};
use crate::search::{LdapEntry, SearchScope};
use crate::session::{AttributeChange, DirectoryConnector, DirectorySession};

/// Opens one LDAPS connection per session.
///
/// The number of simultaneously open connections is bounded by
/// `max_connections`; there is no pooling or reuse.
pub struct LdapConnector {
    config: Arc<LdapBackendConfig>,
    slots: Arc<Semaphore>,
}

impl LdapConnector {
    /// Creates a connector.
    ///
    /// ## Security
    ///
    /// The configuration must use LDAPS. This is validated at config build time.
    #[must_use]
    pub fn new(config: Arc<LdapBackendConfig>) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_connections));
        Self { config, slots }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LdapBackendConfig {
        &self.config
    }

    /// Connection slots currently free.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    async fn connect(&self) -> LdapResult<Ldap> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connection_timeout)
            .set_no_tls_verify(!self.config.validate_certificates);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.connection_url)
            .await
            .map_err(|e| LdapError::connection(e.to_string()))?;

        let backend = self.config.description.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(backend = %backend, error = %e, "LDAP connection driver error");
            }
        });

        let bound = ldap
            .with_timeout(self.config.operation_timeout)
            .simple_bind(
                &self.config.bind_dn,
                self.config.bind_credential.expose_secret(),
            )
            .await
            .map_err(LdapError::from)?
            .success();
        if let Err(e) = bound {
            tracing::warn!(
                backend = %self.config.description,
                error = %LdapError::from(e),
                "Service account bind failed"
            );
            let _ = ldap.unbind().await;
            return Err(LdapError::ServiceBind);
        }

        Ok(ldap)
    }
}

impl std::fmt::Debug for LdapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnector")
            .field("backend", &self.config.description)
            .field("available_slots", &self.available_slots())
            .finish()
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn open(&self) -> LdapResult<Box<dyn DirectorySession>> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| LdapError::ConnectionLimit)?;

        let ldap = self.connect().await?;
        tracing::debug!(backend = %self.config.description, "Opened LDAP connection");

        Ok(Box::new(LdapSession {
            ldap,
            timeout: self.config.operation_timeout,
            closed: false,
            _permit: permit,
        }))
    }
}

/// A bound `ldap3` connection holding one connection slot.
struct LdapSession {
    ldap: Ldap,
    timeout: Duration,
    closed: bool,
    _permit: OwnedSemaphorePermit,
}

impl LdapSession {
    fn ldap(&mut self) -> &mut Ldap {
        self.ldap.with_timeout(self.timeout)
    }
}

fn to_mod(change: AttributeChange) -> Mod<Vec<u8>> {
    match change {
        AttributeChange::Add { attribute, values } => {
            Mod::Add(attribute.into_bytes(), values.into_iter().collect::<HashSet<_>>())
        }
        AttributeChange::Delete { attribute, values } => {
            Mod::Delete(attribute.into_bytes(), values.into_iter().collect::<HashSet<_>>())
        }
        AttributeChange::Replace { attribute, values } => {
            Mod::Replace(attribute.into_bytes(), values.into_iter().collect::<HashSet<_>>())
        }
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn search_entry(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> LdapResult<Vec<LdapEntry>> {
        let attributes: Vec<String> = attributes.iter().map(|a| (*a).to_string()).collect();
        let (rs, _result) = self
            .ldap()
            .search(base, scope.to_ldap3(), filter, attributes)
            .await?
            .success()?;

        Ok(rs
            .into_iter()
            .map(SearchEntry::construct)
            .map(LdapEntry::from_search_entry)
            .collect())
    }

    async fn modify(&mut self, dn: &str, changes: Vec<AttributeChange>) -> LdapResult<()> {
        let mods = changes.into_iter().map(to_mod).collect();
        self.ldap().modify(dn, mods).await?.success()?;
        Ok(())
    }

    async fn compare(&mut self, dn: &str, attribute: &str, value: &[u8]) -> LdapResult<bool> {
        let equal = self.ldap().compare(dn, attribute, value).await?.equal()?;
        Ok(equal)
    }

    async fn password_modify(&mut self, dn: &str, old: Option<&str>, new: &str) -> LdapResult<()> {
        let exop = PasswordModify {
            user_id: Some(dn),
            old_pass: old,
            new_pass: Some(new),
        };
        self.ldap().extended(exop).await?.success()?;
        Ok(())
    }

    async fn bind(&mut self, dn: &str, password: &str) -> LdapResult<()> {
        self.ldap().simple_bind(dn, password).await?.success()?;
        Ok(())
    }

    async fn close(&mut self) -> LdapResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.ldap.unbind().await?;
        Ok(())
    }
}

impl Drop for LdapSession {
    fn drop(&mut self) {
        if !self.closed {
            // Dropping the last handle stops the driver task and closes the socket.
            tracing::debug!("LDAP session dropped without unbind");
        }
    }
}
