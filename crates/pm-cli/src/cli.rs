//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Password manager CLI - self-service password operations against LDAP directories.
#[derive(Debug, Parser)]
#[command(name = "pm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to ~/.pm/pm.toml).
    #[arg(short, long, env = "PM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging when RUST_LOG is not set.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Change a password, verifying the current one.
    ChangePassword {
        /// Username.
        username: String,
    },

    /// Set a password without the current one (administrative reset).
    SetPassword {
        /// Username.
        username: String,
    },

    /// Reset a password after answering every security question.
    ResetPassword {
        /// Username.
        username: String,
    },

    /// Print the security questions of a user.
    Challenge {
        /// Username.
        username: String,
    },

    /// Check one security answer.
    VerifyAnswer {
        /// Username.
        username: String,

        /// Answer attribute of the question to check.
        #[arg(short, long)]
        attribute: String,
    },

    /// Store new security answers for a user.
    SetAnswers {
        /// Username.
        username: String,
    },

    /// Validate the configuration and list backends in priority order.
    Check,
}
