//! # pm-lockout
//!
//! Attempt lockout for credential changes.
//!
//! Tracks failed attempts per username and refuses further attempts once a
//! configured threshold is reached, optionally for a cool-down period only.
//!
//! ## Example
//!
//! ```ignore
//! use pm_lockout::{AttemptLimiter, LockoutPolicy};
//!
//! let limiter = AttemptLimiter::new(LockoutPolicy::default())?;
//! let permit = limiter.permit(&username)?;
//! match change_password().await {
//!     Ok(()) => permit.succeed(),
//!     Err(_) => { permit.record_failure(); }
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod limiter;
pub mod policy;

pub use error::{LockedOut, LockoutError};
pub use limiter::{AttemptLimiter, AttemptPermit};
pub use policy::LockoutPolicy;
