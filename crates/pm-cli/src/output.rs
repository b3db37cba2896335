//! Output formatting utilities.

use colored::Colorize;
use secrecy::SecretString;

use crate::{CliError, CliResult};

/// Prints a success message.
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Prints a warning message.
pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Prints an info message.
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Prompts for hidden input.
///
/// # Errors
///
/// Fails if the terminal cannot be read, or with [`CliError::Cancelled`]
/// when the input is empty.
pub fn prompt_hidden(prompt: &str) -> CliResult<String> {
    let value = rpassword::prompt_password(prompt)?;
    if value.is_empty() {
        return Err(CliError::Cancelled);
    }
    Ok(value)
}

/// Prompts for a password.
///
/// # Errors
///
/// See [`prompt_hidden`].
pub fn prompt_secret(prompt: &str) -> CliResult<SecretString> {
    prompt_hidden(prompt).map(SecretString::from)
}

/// Prompts for a new password twice.
///
/// # Errors
///
/// Fails if the two entries differ.
pub fn prompt_new_password() -> CliResult<SecretString> {
    let first = rpassword::prompt_password("New password: ")?;
    let second = rpassword::prompt_password("Confirm new password: ")?;
    confirm_match(first, &second)
}

fn confirm_match(first: String, second: &str) -> CliResult<SecretString> {
    if first.is_empty() {
        return Err(CliError::Cancelled);
    }
    if first != second {
        return Err(CliError::Validation("passwords do not match".to_string()));
    }
    Ok(SecretString::from(first))
}
