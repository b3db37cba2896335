//! Username newtype.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// An opaque, non-empty username.
///
/// Case sensitivity is decided by each directory backend, so the value is kept
/// exactly as supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Creates a username, rejecting empty or whitespace-only values.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyUsername`] for blank input.
    pub fn new(value: impl Into<String>) -> ModelResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ModelError::EmptyUsername);
        }
        Ok(Self(value))
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = ModelError;

    fn try_from(value: String) -> ModelResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Username {
    type Error = ModelError;

    fn try_from(value: &str) -> ModelResult<Self> {
        Self::new(value)
    }
}

impl FromStr for Username {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        Self::new(s)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_usernames() {
        assert_eq!(Username::new(""), Err(ModelError::EmptyUsername));
        assert_eq!(Username::new("   "), Err(ModelError::EmptyUsername));
    }

    #[test]
    fn keeps_value_verbatim() {
        let username = Username::new("JDoe").unwrap();
        assert_eq!(username.as_str(), "JDoe");
        assert_eq!(username.to_string(), "JDoe");
    }

    #[test]
    fn deserialization_validates() {
        let ok: Username = serde_json::from_str("\"jdoe\"").unwrap();
        assert_eq!(ok.as_str(), "jdoe");

        let err = serde_json::from_str::<Username>("\"\"");
        assert!(err.is_err());
    }
}
