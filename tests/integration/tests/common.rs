//! Common test utilities and fixtures.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pm_directory::{
    BackendChain, BackendDescriptor, BackendError, BackendResult, DirectoryBackend,
    ErrorClassifier, PasswordManager,
};
use pm_directory_ldap::{LdapBackendConfig, LdapDirectory, LdapVendor, MemoryDirectory};
use pm_lockout::{AttemptLimiter, LockoutPolicy};
use pm_model::{ChallengeQuestion, SecurityChallenge, Username};
use secrecy::SecretString;

pub const CORP_PEOPLE: &str = "ou=staff,dc=corp,dc=example";
pub const CAMPUS_PEOPLE: &str = "ou=people,dc=campus,dc=example";

/// Initializes tracing once for the test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pm_directory=debug,pm_directory_ldap=debug")
        .with_test_writer()
        .try_init();
}

pub fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

// ============================================================================
// Spy backend
// ============================================================================

/// What a [`SpyBackend`] answers to every call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Succeed; attribute comparisons match.
    Ok,
    /// The user is not in this directory.
    NotFound,
    /// A native rejection.
    Native(u32, &'static str),
    /// The directory cannot be reached.
    Unavailable,
}

/// A backend that counts calls and answers with a fixed [`Reply`].
pub struct SpyBackend {
    name: &'static str,
    reply: Reply,
    calls: AtomicUsize,
}

impl SpyBackend {
    pub fn new(name: &'static str, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer<T>(&self, value: T) -> BackendResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Ok => Ok(value),
            Reply::NotFound => Err(BackendError::UserNotFound),
            Reply::Native(status, diagnostic) => Err(BackendError::native(*status, *diagnostic)),
            Reply::Unavailable => Err(BackendError::unavailable("connection refused")),
        }
    }
}

#[async_trait]
impl DirectoryBackend for SpyBackend {
    fn description(&self) -> &str {
        self.name
    }

    async fn change_credential(
        &self,
        _username: &Username,
        _old: &SecretString,
        _new: &SecretString,
    ) -> BackendResult<()> {
        self.answer(())
    }

    async fn force_set_credential(
        &self,
        _username: &Username,
        _new: &SecretString,
    ) -> BackendResult<()> {
        self.answer(())
    }

    async fn verify_attribute(
        &self,
        _username: &Username,
        _attribute: &str,
        _expected: &SecretString,
    ) -> BackendResult<bool> {
        self.answer(true)
    }

    async fn fetch_challenge(&self, username: &Username) -> BackendResult<SecurityChallenge> {
        let challenge = SecurityChallenge::new(
            username.clone(),
            vec![ChallengeQuestion::new(format!("{} question", self.name), "pmAnswer")],
        )
        .map_err(|e| BackendError::config(e.to_string()))?;
        self.answer(challenge)
    }
}

/// Chains spy backends in the given order.
pub fn spy_chain(backends: &[&Arc<SpyBackend>]) -> BackendChain {
    let descriptors = backends
        .iter()
        .map(|b| BackendDescriptor::new(Arc::clone(*b) as Arc<dyn DirectoryBackend>))
        .collect();
    BackendChain::new(descriptors).expect("non-empty chain")
}

/// A password manager locking after `threshold` failures.
pub fn manager(chain: BackendChain, threshold: u32) -> PasswordManager {
    let limiter = AttemptLimiter::new(LockoutPolicy::new(threshold)).expect("valid policy");
    PasswordManager::new(chain, Arc::new(limiter), Arc::new(ErrorClassifier::default()))
}

// ============================================================================
// In-memory directories
// ============================================================================

/// An Active Directory domain followed by a generic campus directory.
pub struct TestEnv {
    pub corp: MemoryDirectory,
    pub campus: MemoryDirectory,
    pub manager: PasswordManager,
}

impl TestEnv {
    pub fn new() -> Self {
        init_tracing();

        let corp = MemoryDirectory::active_directory();
        let campus = MemoryDirectory::generic();

        let corp_config = LdapBackendConfig::builder()
            .description("corp")
            .vendor(LdapVendor::ActiveDirectory)
            .connection_url("ldaps://dc1.corp.example")
            .bind_dn("cn=svc,dc=corp,dc=example")
            .bind_credential("svc")
            .users_dn(CORP_PEOPLE)
            .default_question("pmBirthCity", "In which city were you born?")
            .build()
            .expect("valid corp config");
        let campus_config = LdapBackendConfig::builder()
            .description("campus")
            .connection_url("ldaps://ldap.campus.example")
            .bind_dn("cn=admin,dc=campus,dc=example")
            .bind_credential("admin")
            .users_dn(CAMPUS_PEOPLE)
            .default_question("pmBirthCity", "In which city were you born?")
            .default_question("pmPet", "Name of your first pet?")
            .custom_question("pmAnswer1", "pmQuestion1")
            .build()
            .expect("valid campus config");

        let backends = vec![
            BackendDescriptor::new(Arc::new(
                LdapDirectory::new(corp_config, Arc::new(corp.clone())).expect("corp directory"),
            )),
            BackendDescriptor::new(Arc::new(
                LdapDirectory::new(campus_config, Arc::new(campus.clone()))
                    .expect("campus directory"),
            )),
        ];
        let chain = BackendChain::new(backends).expect("non-empty chain");

        Self {
            corp,
            campus,
            manager: manager(chain, 3),
        }
    }

    /// Adds an Active Directory user with a birth city answer.
    pub fn add_corp_user(&self, account: &str, password: &str) -> String {
        let dn = format!("cn={account},{CORP_PEOPLE}");
        self.corp.add_user(
            &dn,
            &[
                ("objectClass", "person"),
                ("sAMAccountName", account),
                ("pmBirthCity", "Oslo"),
            ],
            password,
        );
        dn
    }

    /// Adds a campus user with two default answers and one custom question.
    pub fn add_campus_user(&self, uid: &str, password: &str) -> String {
        let dn = format!("uid={uid},{CAMPUS_PEOPLE}");
        self.campus.add_user(
            &dn,
            &[
                ("objectClass", "inetOrgPerson"),
                ("uid", uid),
                ("pmBirthCity", "Lyon"),
                ("pmPet", "rex"),
                ("pmQuestion1", "Favourite teacher?"),
                ("pmAnswer1", "Mrs Smith"),
            ],
            password,
        );
        dn
    }

    pub fn failures(&self, username: &str) -> u32 {
        let username = Username::new(username).expect("valid username");
        self.manager.credentials().limiter().failure_count(&username)
    }
}
