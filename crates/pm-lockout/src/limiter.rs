//! Attempt limiter.
//!
//! State is kept per username in a sharded map. Every read-modify-write for a
//! username happens while holding that key's entry guard, so two concurrent
//! attempts for the same user cannot both pass on a stale count, while
//! attempts for different users never wait on a global lock.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use pm_model::Username;

use crate::error::{LockedOut, LockoutError};
use crate::policy::LockoutPolicy;

/// Per-username attempt state.
#[derive(Debug, Default)]
struct AttemptState {
    failure_count: u32,
    /// Attempts that passed `permit` and have not settled yet.
    in_flight: u32,
    last_failure: Option<Instant>,
}

impl AttemptState {
    fn is_idle(&self) -> bool {
        self.failure_count == 0 && self.in_flight == 0
    }

    fn cooled_down(&self, policy: &LockoutPolicy, now: Instant) -> bool {
        match (policy.cooldown, self.last_failure) {
            (Some(cooldown), Some(last)) => now.saturating_duration_since(last) >= cooldown,
            _ => false,
        }
    }

    /// Forgets failures whose cool-down has elapsed.
    fn expire(&mut self, policy: &LockoutPolicy, now: Instant) {
        if self.cooled_down(policy, now) {
            self.failure_count = 0;
            self.last_failure = None;
        }
    }

    fn effective_failures(&self, policy: &LockoutPolicy, now: Instant) -> u32 {
        if self.cooled_down(policy, now) {
            0
        } else {
            self.failure_count
        }
    }

    fn retry_after(&self, policy: &LockoutPolicy, now: Instant) -> Option<Duration> {
        if self.failure_count < policy.threshold {
            return None;
        }
        let cooldown = policy.cooldown?;
        let last = self.last_failure?;
        Some(cooldown.saturating_sub(now.saturating_duration_since(last)))
    }
}

/// Tracks failed credential-change attempts per username.
///
/// The limiter never touches a directory backend. It is consulted once per
/// logical attempt, no matter how many backends that attempt tries.
#[derive(Debug)]
pub struct AttemptLimiter {
    policy: LockoutPolicy,
    states: DashMap<Username, AttemptState>,
}

impl AttemptLimiter {
    /// Creates a limiter.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy does not validate.
    pub fn new(policy: LockoutPolicy) -> Result<Self, LockoutError> {
        policy.validate()?;
        Ok(Self {
            policy,
            states: DashMap::new(),
        })
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Asks whether `username` may attempt a credential change now.
    ///
    /// On success the attempt is reserved: until the returned permit is
    /// settled or dropped it counts against the threshold, so concurrent
    /// attempts cannot overshoot it.
    ///
    /// # Errors
    ///
    /// Returns [`LockedOut`] when recorded plus in-flight attempts reach the
    /// threshold. With a threshold of 1 a second concurrent attempt is
    /// refused even though nothing has failed yet.
    pub fn permit(&self, username: &Username) -> Result<AttemptPermit<'_>, LockedOut> {
        let now = Instant::now();
        let mut state = self.states.entry(username.clone()).or_default();
        state.expire(&self.policy, now);

        if state.failure_count.saturating_add(state.in_flight) >= self.policy.threshold {
            let retry_after = state.retry_after(&self.policy, now);
            let failures = state.failure_count;
            let in_flight = state.in_flight;
            drop(state);
            self.prune(username);

            tracing::warn!(
                username = %username,
                failures,
                in_flight,
                "Credential change refused: user is locked out"
            );
            return Err(LockedOut {
                retry_after,
                in_flight,
            });
        }

        state.in_flight += 1;
        drop(state);

        Ok(AttemptPermit {
            limiter: self,
            username: username.clone(),
            settled: false,
        })
    }

    /// Records a failed attempt that was not made through a permit.
    ///
    /// Returns the new failure count.
    pub fn record_failure(&self, username: &Username) -> u32 {
        self.settle_failure(username, false)
    }

    /// Clears all recorded failures for `username`.
    pub fn reset(&self, username: &Username) {
        self.settle_success(username, false);
    }

    /// Current failure count, ignoring failures whose cool-down has elapsed.
    #[must_use]
    pub fn failure_count(&self, username: &Username) -> u32 {
        let now = Instant::now();
        self.states
            .get(username)
            .map_or(0, |s| s.effective_failures(&self.policy, now))
    }

    /// Returns true if the next `permit` for `username` would be refused
    /// because of recorded failures.
    #[must_use]
    pub fn is_locked(&self, username: &Username) -> bool {
        self.failure_count(username) >= self.policy.threshold
    }

    fn settle_failure(&self, username: &Username, reserved: bool) -> u32 {
        let now = Instant::now();
        let mut state = self.states.entry(username.clone()).or_default();
        state.expire(&self.policy, now);
        if reserved {
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure = Some(now);
        let failures = state.failure_count;
        drop(state);

        if failures == self.policy.threshold {
            tracing::warn!(username = %username, failures, "User locked out after repeated failures");
        } else {
            tracing::debug!(username = %username, failures, "Recorded failed attempt");
        }
        failures
    }

    fn settle_success(&self, username: &Username, reserved: bool) {
        if let Some(mut state) = self.states.get_mut(username) {
            if reserved {
                state.in_flight = state.in_flight.saturating_sub(1);
            }
            state.failure_count = 0;
            state.last_failure = None;
        }
        self.prune(username);
        tracing::debug!(username = %username, "Cleared failed attempts");
    }

    fn release(&self, username: &Username) {
        if let Some(mut state) = self.states.get_mut(username) {
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.prune(username);
    }

    fn prune(&self, username: &Username) {
        self.states.remove_if(username, |_, state| state.is_idle());
    }
}

/// A reserved attempt.
///
/// Settle it with [`record_failure`](Self::record_failure) or
/// [`succeed`](Self::succeed). Dropping it unsettled releases the reservation
/// without changing the failure count.
#[must_use = "dropping a permit releases it without recording an outcome"]
#[derive(Debug)]
pub struct AttemptPermit<'a> {
    limiter: &'a AttemptLimiter,
    username: Username,
    settled: bool,
}

impl AttemptPermit<'_> {
    /// The user this permit was issued for.
    #[must_use]
    pub const fn username(&self) -> &Username {
        &self.username
    }

    /// Records the attempt as failed. Returns the new failure count.
    pub fn record_failure(mut self) -> u32 {
        self.settled = true;
        self.limiter.settle_failure(&self.username, true)
    }

    /// Records the attempt as successful, clearing earlier failures.
    pub fn succeed(mut self) {
        self.settled = true;
        self.limiter.settle_success(&self.username, true);
    }
}

impl Drop for AttemptPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.limiter.release(&self.username);
        }
    }
}
