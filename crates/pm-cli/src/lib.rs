//! # pm-cli
//!
//! Command-line administration for the password manager.
//!
//! This crate provides:
//! - Password change and administrative reset against the configured directories
//! - Security question listing, checking and enrolment
//! - Configuration checking

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use config::PmConfig;
pub use error::{CliError, CliResult};
