//! CLI configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pm_directory::{ClassifierConfig, ErrorClassifier, PasswordManager};
use pm_directory_ldap::{LdapBackendConfig, backend_chain};
use pm_lockout::{AttemptLimiter, LockoutPolicy};
use serde::Deserialize;

use crate::{CliError, CliResult};

/// Password manager configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PmConfig {
    /// Attempt lockout policy.
    #[serde(default)]
    pub lockout: LockoutPolicy,

    /// Diagnostic classification overrides.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Directory backends in priority order.
    #[serde(default)]
    pub backends: Vec<LdapBackendConfig>,
}

impl PmConfig {
    /// Loads and validates configuration from `path`, or from the default
    /// location.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or unreadable, or if [`Self::validate`]
    /// rejects it.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        if !path.exists() {
            return Err(CliError::config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), backends = config.backends.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or if [`Self::validate`] rejects it.
    pub fn parse(content: &str) -> CliResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CliError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Gets the default configuration file path.
    ///
    /// # Errors
    ///
    /// Fails if the home directory cannot be determined.
    pub fn default_path() -> CliResult<PathBuf> {
        let home = dirs_next::home_dir()
            .ok_or_else(|| CliError::config("could not determine home directory"))?;
        Ok(home.join(".pm").join("pm.toml"))
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Fails on an invalid lockout policy, classifier pattern or rule, on an
    /// invalid backend, or if no backend is configured.
    pub fn validate(&self) -> CliResult<()> {
        self.lockout
            .validate()
            .map_err(|e| CliError::config(format!("lockout: {e}")))?;
        ErrorClassifier::new(&self.classifier)
            .map_err(|e| CliError::config(format!("classifier: {e}")))?;

        if self.backends.is_empty() {
            return Err(CliError::config("at least one backend must be configured"));
        }
        for (index, backend) in self.backends.iter().enumerate() {
            backend.validate().map_err(|e| {
                CliError::config(format!("backend #{} ({}): {e}", index + 1, backend.description))
            })?;
        }
        Ok(())
    }

    /// Builds the password manager described by this configuration.
    ///
    /// No directory is contacted until the first operation.
    ///
    /// # Errors
    ///
    /// Fails if any section is invalid.
    pub fn build(&self) -> CliResult<PasswordManager> {
        let limiter = AttemptLimiter::new(self.lockout.clone())
            .map_err(|e| CliError::config(format!("lockout: {e}")))?;
        let classifier = ErrorClassifier::new(&self.classifier)
            .map_err(|e| CliError::config(format!("classifier: {e}")))?;
        let chain = backend_chain(self.backends.clone())?;

        Ok(PasswordManager::new(chain, Arc::new(limiter), Arc::new(classifier)))
    }
}
