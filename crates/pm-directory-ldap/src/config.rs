//! LDAP backend configuration.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: Only LDAPS (LDAP over TLS) is supported.
//!
//! - Connection URLs MUST start with `ldaps://`
//! - STARTTLS is NOT supported (vulnerable to downgrade attacks)
//! - Plain `ldap://` is NOT supported (credentials transmitted in cleartext)

use std::collections::HashSet;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::encoding::PasswordHash;
use crate::error::{LdapError, LdapResult};
use crate::search::ldap_escape;

const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_CONNECTIONS: usize = 10;

// ============================================================================
// LDAP Vendor
// ============================================================================

/// Directory family.
///
/// Decides how passwords are encoded and changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LdapVendor {
    /// RFC 4510 directory such as OpenLDAP.
    #[default]
    Generic,

    /// Microsoft Active Directory.
    ActiveDirectory,
}

impl LdapVendor {
    /// Returns the default user object class for this vendor.
    #[must_use]
    pub const fn user_object_class(&self) -> &'static str {
        match self {
            Self::ActiveDirectory => "person",
            Self::Generic => "inetOrgPerson",
        }
    }

    /// Returns the default username attribute for this vendor.
    #[must_use]
    pub const fn username_attribute(&self) -> &'static str {
        match self {
            Self::ActiveDirectory => "sAMAccountName",
            Self::Generic => "uid",
        }
    }

    /// Returns the default password attribute for this vendor.
    #[must_use]
    pub const fn password_attribute(&self) -> &'static str {
        match self {
            Self::ActiveDirectory => "unicodePwd",
            Self::Generic => "userPassword",
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Transformation applied to a username before the DN lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsernameTransform {
    /// Use the username as given.
    #[default]
    None,
    /// Lower-case the username.
    Lowercase,
    /// Upper-case the username.
    Uppercase,
}

impl UsernameTransform {
    /// Applies the transformation.
    #[must_use]
    pub fn apply(&self, username: &str) -> String {
        match self {
            Self::None => username.to_string(),
            Self::Lowercase => username.to_lowercase(),
            Self::Uppercase => username.to_uppercase(),
        }
    }
}

/// How a generic directory changes a password when the old one is given.
///
/// Active Directory ignores this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeMode {
    /// RFC 3062 Password Modify extended operation. The server checks the
    /// old password and writes the new one in a single operation.
    #[default]
    PasswordModify,

    /// Bind as the user with the old password, then replace the password
    /// attribute on that connection.
    ///
    /// The check and the write are two operations: a concurrent change
    /// landing between them is overwritten.
    VerifyThenSet,
}

/// A question with a fixed prompt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DefaultQuestion {
    /// Attribute holding the user's answer.
    pub answer_attribute: String,
    /// Prompt shown to the user.
    pub prompt: String,
}

/// A question whose prompt is stored on the user's entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomQuestion {
    /// Attribute holding the user's answer.
    pub answer_attribute: String,
    /// Attribute holding the user's question.
    pub question_attribute: String,
}

// ============================================================================
// LDAP Backend Configuration
// ============================================================================

/// Configuration of one LDAP backend.
///
/// ## Security Requirements
///
/// The `connection_url` MUST use the `ldaps://` scheme.
/// Any attempt to use `ldap://` or STARTTLS will be rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct LdapBackendConfig {
    /// Name used in logs.
    pub description: String,

    /// Directory family.
    #[serde(default)]
    pub vendor: LdapVendor,

    // === Connection ===
    /// LDAP server URL (MUST be ldaps://).
    pub connection_url: String,

    /// Bind DN for the service account.
    pub bind_dn: String,

    /// Bind credential for the service account.
    #[serde(deserialize_with = "deserialize_secret")]
    pub bind_credential: SecretString,

    /// Whether to validate server certificates.
    /// Should always be true in production.
    #[serde(default = "default_true")]
    pub validate_certificates: bool,

    /// Connect timeout.
    #[serde(default = "default_connection_timeout", with = "humantime_serde")]
    pub connection_timeout: Duration,

    /// Timeout applied to each operation.
    #[serde(default = "default_operation_timeout", with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Maximum simultaneous connections to this backend.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    // === Directory Structure ===
    /// Base DN for user searches.
    pub users_dn: String,

    /// User object class. Defaults to the vendor's.
    #[serde(default)]
    pub user_object_class: Option<String>,

    /// Attribute matched against the username. Defaults to the vendor's.
    #[serde(default)]
    pub username_attribute: Option<String>,

    /// Attribute holding the password. Defaults to the vendor's.
    #[serde(default)]
    pub password_attribute: Option<String>,

    /// Transformation applied to usernames before lookup.
    #[serde(default)]
    pub username_transform: UsernameTransform,

    // === Passwords ===
    /// Password change strategy for generic directories.
    #[serde(default)]
    pub change_mode: ChangeMode,

    /// Hash applied to passwords written as attribute values (generic only).
    #[serde(default)]
    pub password_hash: Option<PasswordHash>,

    // === Security Questions ===
    /// Questions with configured prompts, asked first.
    #[serde(default)]
    pub default_questions: Vec<DefaultQuestion>,

    /// Questions with per-user prompts, asked after the default questions.
    #[serde(default)]
    pub custom_questions: Vec<CustomQuestion>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

const fn default_true() -> bool {
    true
}

const fn default_connection_timeout() -> Duration {
    DEFAULT_CONNECTION_TIMEOUT
}

const fn default_operation_timeout() -> Duration {
    DEFAULT_OPERATION_TIMEOUT
}

const fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

impl LdapBackendConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> LdapBackendConfigBuilder {
        LdapBackendConfigBuilder::new()
    }

    /// Validates the configuration.
    ///
    /// ## Security
    ///
    /// This method enforces LDAPS-only connections.
    pub fn validate(&self) -> LdapResult<()> {
        // CRITICAL: Enforce LDAPS-only
        validate_ldaps_url(&self.connection_url)?;

        if self.description.trim().is_empty() {
            return Err(LdapError::config("description cannot be empty"));
        }
        if self.bind_dn.is_empty() {
            return Err(LdapError::config("bind_dn cannot be empty"));
        }
        if self.users_dn.is_empty() {
            return Err(LdapError::config("users_dn cannot be empty"));
        }
        if self.password_attribute().is_empty() {
            return Err(LdapError::config("password_attribute cannot be empty"));
        }
        if self.username_attribute().is_empty() {
            return Err(LdapError::config("username_attribute cannot be empty"));
        }
        if self.max_connections == 0 {
            return Err(LdapError::config("max_connections must be at least 1"));
        }
        if self.vendor == LdapVendor::ActiveDirectory && self.password_hash.is_some() {
            return Err(LdapError::config(
                "password_hash is not supported for Active Directory",
            ));
        }

        let mut seen = HashSet::new();
        let answer_attributes = self
            .default_questions
            .iter()
            .map(|q| q.answer_attribute.as_str())
            .chain(self.custom_questions.iter().map(|q| q.answer_attribute.as_str()));
        for attribute in answer_attributes {
            if attribute.is_empty() {
                return Err(LdapError::config("answer_attribute cannot be empty"));
            }
            if !seen.insert(attribute.to_ascii_lowercase()) {
                return Err(LdapError::config(format!(
                    "answer attribute '{attribute}' is used by more than one question"
                )));
            }
        }
        if self.custom_questions.iter().any(|q| q.question_attribute.is_empty()) {
            return Err(LdapError::config("question_attribute cannot be empty"));
        }

        Ok(())
    }

    /// Effective user object class.
    #[must_use]
    pub fn user_object_class(&self) -> &str {
        self.user_object_class
            .as_deref()
            .unwrap_or_else(|| self.vendor.user_object_class())
    }

    /// Effective username attribute.
    #[must_use]
    pub fn username_attribute(&self) -> &str {
        self.username_attribute
            .as_deref()
            .unwrap_or_else(|| self.vendor.username_attribute())
    }

    /// Effective password attribute.
    #[must_use]
    pub fn password_attribute(&self) -> &str {
        self.password_attribute
            .as_deref()
            .unwrap_or_else(|| self.vendor.password_attribute())
    }

    /// Search filter for the user with the given (untransformed) username.
    #[must_use]
    pub fn user_by_username_filter(&self, username: &str) -> String {
        let transformed = self.username_transform.apply(username);
        format!(
            "(&(objectClass={})({}={}))",
            self.user_object_class(),
            self.username_attribute(),
            ldap_escape(&transformed)
        )
    }

    /// Returns true if `answer_attribute` belongs to a configured question.
    #[must_use]
    pub fn has_question(&self, answer_attribute: &str) -> bool {
        self.default_questions
            .iter()
            .any(|q| q.answer_attribute.eq_ignore_ascii_case(answer_attribute))
            || self.custom_question(answer_attribute).is_some()
    }

    /// Finds the custom question backed by `answer_attribute`.
    #[must_use]
    pub fn custom_question(&self, answer_attribute: &str) -> Option<&CustomQuestion> {
        self.custom_questions
            .iter()
            .find(|q| q.answer_attribute.eq_ignore_ascii_case(answer_attribute))
    }
}

/// Validates that a URL uses LDAPS.
///
/// ## Security
///
/// **CRITICAL**: Only `ldaps://` URLs are accepted.
/// - `ldap://` is rejected (cleartext credentials)
/// - STARTTLS is not supported (vulnerable to downgrade attacks)
fn validate_ldaps_url(url: &str) -> LdapResult<()> {
    const SCHEME: &str = "ldaps://";

    if !url.to_lowercase().starts_with(SCHEME) {
        return Err(LdapError::InsecureProtocol);
    }
    if url.len() <= SCHEME.len() {
        return Err(LdapError::config("Invalid LDAPS URL: missing host"));
    }

    Ok(())
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for LDAP backend configuration.
#[derive(Debug, Default)]
pub struct LdapBackendConfigBuilder {
    description: Option<String>,
    vendor: LdapVendor,
    connection_url: Option<String>,
    bind_dn: Option<String>,
    bind_credential: Option<SecretString>,
    validate_certificates: bool,
    connection_timeout: Duration,
    operation_timeout: Duration,
    max_connections: usize,
    users_dn: Option<String>,
    user_object_class: Option<String>,
    username_attribute: Option<String>,
    password_attribute: Option<String>,
    username_transform: UsernameTransform,
    change_mode: ChangeMode,
    password_hash: Option<PasswordHash>,
    default_questions: Vec<DefaultQuestion>,
    custom_questions: Vec<CustomQuestion>,
}

impl LdapBackendConfigBuilder {
    /// Creates a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            validate_certificates: true,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            ..Default::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the vendor.
    #[must_use]
    pub const fn vendor(mut self, vendor: LdapVendor) -> Self {
        self.vendor = vendor;
        self
    }

    /// Sets the connection URL (must be ldaps://).
    #[must_use]
    pub fn connection_url(mut self, url: impl Into<String>) -> Self {
        self.connection_url = Some(url.into());
        self
    }

    /// Sets the bind DN.
    #[must_use]
    pub fn bind_dn(mut self, dn: impl Into<String>) -> Self {
        self.bind_dn = Some(dn.into());
        self
    }

    /// Sets the bind credential.
    #[must_use]
    pub fn bind_credential(mut self, credential: impl Into<String>) -> Self {
        self.bind_credential = Some(SecretString::from(credential.into()));
        self
    }

    /// Sets whether to validate certificates.
    #[must_use]
    pub const fn validate_certificates(mut self, validate: bool) -> Self {
        self.validate_certificates = validate;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the per-operation timeout.
    #[must_use]
    pub const fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sets the connection limit.
    #[must_use]
    pub const fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the users DN.
    #[must_use]
    pub fn users_dn(mut self, dn: impl Into<String>) -> Self {
        self.users_dn = Some(dn.into());
        self
    }

    /// Sets the user object class.
    #[must_use]
    pub fn user_object_class(mut self, class: impl Into<String>) -> Self {
        self.user_object_class = Some(class.into());
        self
    }

    /// Sets the username attribute.
    #[must_use]
    pub fn username_attribute(mut self, attr: impl Into<String>) -> Self {
        self.username_attribute = Some(attr.into());
        self
    }

    /// Sets the password attribute.
    #[must_use]
    pub fn password_attribute(mut self, attr: impl Into<String>) -> Self {
        self.password_attribute = Some(attr.into());
        self
    }

    /// Sets the username transformation.
    #[must_use]
    pub const fn username_transform(mut self, transform: UsernameTransform) -> Self {
        self.username_transform = transform;
        self
    }

    /// Sets the change mode.
    #[must_use]
    pub const fn change_mode(mut self, mode: ChangeMode) -> Self {
        self.change_mode = mode;
        self
    }

    /// Sets the password hash.
    #[must_use]
    pub const fn password_hash(mut self, hash: PasswordHash) -> Self {
        self.password_hash = Some(hash);
        self
    }

    /// Adds a default question.
    #[must_use]
    pub fn default_question(
        mut self,
        answer_attribute: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        self.default_questions.push(DefaultQuestion {
            answer_attribute: answer_attribute.into(),
            prompt: prompt.into(),
        });
        self
    }

    /// Adds a custom question.
    #[must_use]
    pub fn custom_question(
        mut self,
        answer_attribute: impl Into<String>,
        question_attribute: impl Into<String>,
    ) -> Self {
        self.custom_questions.push(CustomQuestion {
            answer_attribute: answer_attribute.into(),
            question_attribute: question_attribute.into(),
        });
        self
    }

    /// Builds and validates the configuration.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - Required fields are missing
    /// - Connection URL does not use LDAPS
    /// - Any other check of [`LdapBackendConfig::validate`] fails
    pub fn build(self) -> LdapResult<LdapBackendConfig> {
        let connection_url = self
            .connection_url
            .ok_or_else(|| LdapError::config("connection_url is required"))?;

        let config = LdapBackendConfig {
            description: self.description.unwrap_or_else(|| connection_url.clone()),
            vendor: self.vendor,
            connection_url,
            bind_dn: self
                .bind_dn
                .ok_or_else(|| LdapError::config("bind_dn is required"))?,
            bind_credential: self
                .bind_credential
                .ok_or_else(|| LdapError::config("bind_credential is required"))?,
            validate_certificates: self.validate_certificates,
            connection_timeout: self.connection_timeout,
            operation_timeout: self.operation_timeout,
            max_connections: self.max_connections,
            users_dn: self
                .users_dn
                .ok_or_else(|| LdapError::config("users_dn is required"))?,
            user_object_class: self.user_object_class,
            username_attribute: self.username_attribute,
            password_attribute: self.password_attribute,
            username_transform: self.username_transform,
            change_mode: self.change_mode,
            password_hash: self.password_hash,
            default_questions: self.default_questions,
            custom_questions: self.custom_questions,
        };

        // Validate configuration (includes LDAPS check)
        config.validate()?;

        Ok(config)
    }
}
