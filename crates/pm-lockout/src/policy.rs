//! Lockout policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LockoutError;

/// Lockout policy.
///
/// A user is locked once `threshold` failures have been recorded. Without a
/// cool-down the lock lasts until an administrator resets it or a credential
/// change succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    /// Failures before the user is locked.
    pub threshold: u32,

    /// How long after the last failure the lock is lifted.
    #[serde(default, with = "humantime_serde")]
    pub cooldown: Option<Duration>,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            cooldown: Some(Duration::from_secs(15 * 60)),
        }
    }
}

impl LockoutPolicy {
    /// Creates a policy that locks permanently after `threshold` failures.
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self {
            threshold,
            cooldown: None,
        }
    }

    /// Sets the cool-down.
    #[must_use]
    pub const fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// A zero threshold would lock every user before the first attempt.
    pub fn validate(&self) -> Result<(), LockoutError> {
        if self.threshold == 0 {
            return Err(LockoutError::InvalidPolicy(
                "threshold must be at least 1".to_string(),
            ));
        }
        if self.cooldown.is_some_and(|c| c.is_zero()) {
            return Err(LockoutError::InvalidPolicy(
                "cooldown must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
