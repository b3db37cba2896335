//! Password commands.

use pm_directory::PasswordManager;
use pm_model::SecurityChallenge;

use crate::output::{prompt_hidden, prompt_new_password, prompt_secret, success};
use crate::{CliError, CliResult};

/// Changes a password, verifying the current one.
///
/// # Errors
///
/// Fails if a prompt fails or the password manager refuses the change.
pub async fn run_change_password(manager: &PasswordManager, username: &str) -> CliResult<()> {
    let old = prompt_secret("Current password: ")?;
    let new = prompt_new_password()?;

    manager.change_password(username, &old, &new).await?;
    success(&format!("Password changed for '{username}'"));
    Ok(())
}

/// Sets a password without the current one.
///
/// # Errors
///
/// Fails if a prompt fails or no backend accepts the new password.
pub async fn run_set_password(manager: &PasswordManager, username: &str) -> CliResult<()> {
    let new = prompt_new_password()?;

    manager.credentials().set_credential(username, &new).await?;
    success(&format!("Password set for '{username}'"));
    Ok(())
}

/// Resets a password after the user answers every security question.
///
/// # Errors
///
/// Fails if a prompt fails, an answer is wrong, or the reset is refused.
pub async fn run_reset_password(manager: &PasswordManager, username: &str) -> CliResult<()> {
    let challenge = manager.security_challenge(username).await?;
    let answered = answer_all(challenge)?;
    let new = prompt_new_password()?;

    if manager.reset_password(&answered, &new).await? {
        success(&format!("Password reset for '{username}'"));
        Ok(())
    } else {
        Err(CliError::Validation(
            "security answers do not match".to_string(),
        ))
    }
}

/// Prompts for the answer to every question of `challenge`.
pub(crate) fn answer_all(challenge: SecurityChallenge) -> CliResult<SecurityChallenge> {
    let mut answered = challenge;
    let questions: Vec<(String, String)> = answered
        .questions()
        .iter()
        .map(|q| (q.prompt.clone(), q.answer_attribute.clone()))
        .collect();
    for (prompt, attribute) in questions {
        let answer = prompt_hidden(&format!("{prompt} "))?;
        answered = answered
            .answer(&attribute, answer)
            .map_err(|e| CliError::Validation(e.to_string()))?;
    }
    Ok(answered)
}
