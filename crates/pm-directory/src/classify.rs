//! Error classification.
//!
//! Directories report failures as a numeric result code plus free text. For
//! Active Directory the interesting part is the Win32 sub-code embedded in the
//! text, e.g.
//!
//! ```text
//! LDAP: error code 19 - 0000052D: Constraint violation. AtrErr: DSID-03190F80 ...
//! ```
//!
//! Failed binds carry the reason after `data` instead, padded here to eight
//! digits:
//!
//! ```text
//! 80090308: LdapErr: DSID-0C09044E, comment: AcceptSecurityContext error, data 775, v4563
//! ```
//!
//! [`ErrorClassifier`] turns such a pair into a [`ClassifiedError`]. Lookups
//! are resolved in this order:
//!
//! 1. configured `(status, sub-code)` rules
//! 2. built-in `(status, sub-code)` table
//! 3. configured status-only rules
//! 4. built-in status table
//! 5. [`ClassifiedError::Unknown`]

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// Diagnostic pattern used when none is configured.
///
/// Must define a capture group named `sub_code`.
pub const DEFAULT_DIAGNOSTIC_PATTERN: &str =
    r"(?:LDAP: error code \d+ - )?\b(?P<sub_code>[0-9A-Fa-f]{8}):";

const SUB_CODE_GROUP: &str = "sub_code";

const INVALID_CREDENTIALS: u32 = 49;

/// Bind failure reason, e.g. `data 52e`.
const BIND_DATA_PATTERN: &str = r"\bdata (?P<sub_code>[0-9A-Fa-f]{1,8})\b";

const POLICY_REASON: &str = "new password does not satisfy the directory password policy";

/// Stable interpretation of a native directory failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedError {
    /// The old credential did not match.
    InvalidOldCredential,
    /// The new credential was rejected by policy.
    PolicyViolation {
        /// Human-safe explanation.
        reason: Option<String>,
    },
    /// The directory does not know the user.
    UserNotFound,
    /// The directory is busy, down or timing out.
    BackendUnavailable,
    /// The account is locked or disabled in the directory.
    LockedOut,
    /// Nothing matched.
    Unknown,
}

impl ClassifiedError {
    /// Returns true if the failure is about the user's credential or account,
    /// so trying another backend cannot help.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InvalidOldCredential | Self::PolicyViolation { .. } | Self::LockedOut
        )
    }
}

/// Rule target in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationKind {
    /// See [`ClassifiedError::InvalidOldCredential`].
    InvalidOldCredential,
    /// See [`ClassifiedError::PolicyViolation`].
    PolicyViolation,
    /// See [`ClassifiedError::UserNotFound`].
    UserNotFound,
    /// See [`ClassifiedError::BackendUnavailable`].
    BackendUnavailable,
    /// See [`ClassifiedError::LockedOut`].
    LockedOut,
    /// See [`ClassifiedError::Unknown`].
    Unknown,
}

impl ClassificationKind {
    fn into_classified(self, reason: Option<String>) -> ClassifiedError {
        match self {
            Self::InvalidOldCredential => ClassifiedError::InvalidOldCredential,
            Self::PolicyViolation => ClassifiedError::PolicyViolation { reason },
            Self::UserNotFound => ClassifiedError::UserNotFound,
            Self::BackendUnavailable => ClassifiedError::BackendUnavailable,
            Self::LockedOut => ClassifiedError::LockedOut,
            Self::Unknown => ClassifiedError::Unknown,
        }
    }
}

/// A configured classification override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Native result code.
    pub status: u32,

    /// Eight hex digit sub-code. Without one the rule applies to the whole status.
    #[serde(default)]
    pub sub_code: Option<String>,

    /// Classification to produce.
    pub kind: ClassificationKind,

    /// Reason reported with `policy_violation`.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Classifier configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Diagnostic pattern. Defaults to [`DEFAULT_DIAGNOSTIC_PATTERN`].
    pub pattern: Option<String>,

    /// Overrides, consulted before the built-in tables.
    pub rules: Vec<ClassificationRule>,
}

/// Maps `(status, diagnostic)` pairs to [`ClassifiedError`].
///
/// Immutable after construction and safe to share between tasks.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    pattern: Regex,
    bind_data: Regex,
    sub_code_rules: HashMap<(u32, String), ClassifiedError>,
    status_rules: HashMap<u32, ClassifiedError>,
}

impl ErrorClassifier {
    /// Builds a classifier from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the pattern does not compile or lacks a `sub_code` group, or
    /// if a rule's sub-code is not eight hex digits.
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let source = config
            .pattern
            .as_deref()
            .unwrap_or(DEFAULT_DIAGNOSTIC_PATTERN);
        let pattern =
            Regex::new(source).map_err(|e| ClassifierError::InvalidPattern(e.to_string()))?;
        if !pattern
            .capture_names()
            .any(|name| name == Some(SUB_CODE_GROUP))
        {
            return Err(ClassifierError::MissingSubCodeGroup);
        }

        let mut sub_code_rules = HashMap::new();
        let mut status_rules = HashMap::new();
        for rule in &config.rules {
            let classified = rule.kind.into_classified(rule.reason.clone());
            match &rule.sub_code {
                Some(sub_code) => {
                    if !is_sub_code(sub_code) {
                        return Err(ClassifierError::InvalidSubCode(sub_code.clone()));
                    }
                    sub_code_rules.insert((rule.status, sub_code.to_ascii_uppercase()), classified);
                }
                None => {
                    status_rules.insert(rule.status, classified);
                }
            }
        }

        tracing::debug!(
            sub_code_rules = sub_code_rules.len(),
            status_rules = status_rules.len(),
            "Built error classifier"
        );

        Ok(Self {
            pattern,
            bind_data: bind_data_pattern(),
            sub_code_rules,
            status_rules,
        })
    }

    /// Classifies a native failure.
    #[must_use]
    pub fn classify(&self, status: u32, diagnostic: &str) -> ClassifiedError {
        if let Some(sub_code) = self.sub_code(status, diagnostic) {
            if let Some(classified) = self.sub_code_rules.get(&(status, sub_code.clone())) {
                return classified.clone();
            }
            if let Some(classified) = builtin_sub_code(status, &sub_code) {
                return classified;
            }
        }

        if let Some(classified) = self.status_rules.get(&status) {
            return classified.clone();
        }
        builtin_status(status).unwrap_or(ClassifiedError::Unknown)
    }

    /// Extracts the sub-code from a diagnostic, upper-cased and padded to
    /// eight digits. For bind failures the `data` reason wins over the
    /// leading code.
    fn sub_code(&self, status: u32, diagnostic: &str) -> Option<String> {
        (status == INVALID_CREDENTIALS)
            .then(|| self.bind_data.captures(diagnostic))
            .flatten()
            .or_else(|| self.pattern.captures(diagnostic))
            .and_then(|caps| caps.name(SUB_CODE_GROUP))
            .map(|m| format!("{:0>8}", m.as_str().to_ascii_uppercase()))
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_DIAGNOSTIC_PATTERN)
                .unwrap_or_else(|_| unreachable!("default diagnostic pattern compiles")),
            bind_data: bind_data_pattern(),
            sub_code_rules: HashMap::new(),
            status_rules: HashMap::new(),
        }
    }
}

fn bind_data_pattern() -> Regex {
    Regex::new(BIND_DATA_PATTERN).unwrap_or_else(|_| unreachable!("bind data pattern compiles"))
}

fn is_sub_code(s: &str) -> bool {
    s.len() == 8 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Win32 sub-codes surfaced by Active Directory.
fn builtin_sub_code(status: u32, sub_code: &str) -> Option<ClassifiedError> {
    let classified = match (status, sub_code) {
        (19, "0000052D") => ClassifiedError::PolicyViolation {
            reason: Some(POLICY_REASON.to_string()),
        },
        (19, "00000056") | (49, "0000052E") => ClassifiedError::InvalidOldCredential,
        // account locked out / account disabled
        (19 | 49, "00000775" | "00000533") => ClassifiedError::LockedOut,
        (32 | 49, "00000525") => ClassifiedError::UserNotFound,
        _ => return None,
    };
    Some(classified)
}

fn builtin_status(status: u32) -> Option<ClassifiedError> {
    match status {
        32 => Some(ClassifiedError::UserNotFound),
        49 => Some(ClassifiedError::InvalidOldCredential),
        51 | 52 | 81 | 85 | 91 => Some(ClassifiedError::BackendUnavailable),
        _ => None,
    }
}
