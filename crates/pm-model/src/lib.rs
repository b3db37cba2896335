//! # pm-model
//!
//! Domain model for the password manager.
//!
//! These types are shared by the lockout, directory and CLI crates. They carry
//! no I/O and no directory-specific detail.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod challenge;
pub mod error;
pub mod username;

pub use challenge::{ChallengeQuestion, SecurityChallenge};
pub use error::{ModelError, ModelResult};
pub use username::Username;
