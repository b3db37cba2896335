//! # pm-directory
//!
//! Directory backend framework for the password manager.
//!
//! This crate defines the [`DirectoryBackend`] trait implemented by each
//! directory family, and the services that drive an ordered list of backends:
//!
//! - [`CredentialOrchestrator`] - password change and reset with lockout
//! - [`SecurityChallengeService`] - security question retrieval and checking
//! - [`ErrorClassifier`] - maps native status/diagnostic pairs to [`ClassifiedError`]
//!
//! Backends are tried in their configured order. A backend that does not know
//! the user is skipped, transient failures fail over to the next backend, and
//! failures attributable to the credential itself stop immediately.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backend;
pub mod challenge;
pub mod classify;
pub mod error;
mod failover;
pub mod orchestrator;
pub mod service;

pub use backend::{BackendChain, BackendDescriptor, DirectoryBackend};
pub use challenge::SecurityChallengeService;
pub use classify::{
    ClassificationKind, ClassificationRule, ClassifiedError, ClassifierConfig, ErrorClassifier,
};
pub use error::{BackendError, BackendResult, ClassifierError, PasswordManagerError, PmResult};
pub use orchestrator::CredentialOrchestrator;
pub use service::PasswordManager;
