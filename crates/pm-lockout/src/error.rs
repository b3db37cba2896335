//! Lockout error types.

use std::time::Duration;

use thiserror::Error;

/// Signal returned when a user may not attempt a credential change.
///
/// Attempts still in progress count toward the threshold, so a user with
/// fewer recorded failures than the threshold is refused while enough of
/// their attempts are pending. `in_flight` tells the two cases apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("too many failed attempts; user is locked out")]
pub struct LockedOut {
    /// Time left until the cool-down expires, when one is configured.
    pub retry_after: Option<Duration>,
    /// Attempts in progress when the request was refused.
    pub in_flight: u32,
}

/// Errors building a limiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockoutError {
    /// The policy is unusable.
    #[error("invalid lockout policy: {0}")]
    InvalidPolicy(String),
}
