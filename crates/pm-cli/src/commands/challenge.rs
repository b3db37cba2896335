//! Security question commands.

use pm_directory::PasswordManager;
use pm_model::{ChallengeQuestion, SecurityChallenge};

use crate::output::{info, prompt_hidden, success, warning};
use crate::{CliError, CliResult};

/// Prints the security questions of a user.
///
/// # Errors
///
/// Fails if no backend can produce the user's challenge.
pub async fn run_challenge(manager: &PasswordManager, username: &str) -> CliResult<()> {
    let challenge = manager.security_challenge(username).await?;
    info(&format!("Security questions for '{username}':"));
    for line in question_lines(&challenge) {
        println!("  {line}");
    }
    Ok(())
}

/// Checks one security answer.
///
/// # Errors
///
/// Fails if the user has no question for `attribute` or the answer is wrong.
pub async fn run_verify_answer(
    manager: &PasswordManager,
    username: &str,
    attribute: &str,
) -> CliResult<()> {
    let challenge = manager.security_challenge(username).await?;
    let question = find_question(&challenge, attribute)?;
    let answer = prompt_hidden(&format!("{} ", question.prompt))?;

    let answered = question.clone().with_answer(answer);
    if manager.challenges().verify_answer(username, &answered).await? {
        success("Answer matches");
        Ok(())
    } else {
        Err(CliError::Validation("answer does not match".to_string()))
    }
}

/// Stores new security answers. Questions left blank keep their answer.
///
/// # Errors
///
/// Fails if every question is left blank or the directory refuses the write.
pub async fn run_set_answers(manager: &PasswordManager, username: &str) -> CliResult<()> {
    let mut challenge = manager.security_challenge(username).await?;
    info("Leave a question blank to keep its current answer.");

    let attributes: Vec<(String, String)> = challenge
        .questions()
        .iter()
        .map(|q| (q.prompt.clone(), q.answer_attribute.clone()))
        .collect();
    for (prompt, attribute) in attributes {
        match prompt_hidden(&format!("{prompt} ")) {
            Ok(answer) => {
                challenge = challenge
                    .answer(&attribute, answer)
                    .map_err(|e| CliError::Validation(e.to_string()))?;
            }
            Err(CliError::Cancelled) => warning(&format!("Keeping answer for {attribute}")),
            Err(e) => return Err(e),
        }
    }

    manager.challenges().store_challenge(&challenge).await?;
    success(&format!("Security answers stored for '{username}'"));
    Ok(())
}

fn find_question<'a>(
    challenge: &'a SecurityChallenge,
    attribute: &str,
) -> CliResult<&'a ChallengeQuestion> {
    challenge
        .questions()
        .iter()
        .find(|q| q.answer_attribute.eq_ignore_ascii_case(attribute))
        .ok_or_else(|| {
            CliError::Validation(format!("no security question uses attribute '{attribute}'"))
        })
}

/// One numbered line per question, with its answer attribute.
fn question_lines(challenge: &SecurityChallenge) -> Vec<String> {
    challenge
        .questions()
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {} [{}]", i + 1, q.prompt, q.answer_attribute))
        .collect()
}
