//! Security question flows against in-memory LDAP directories.

use pm_directory::PasswordManagerError;
use pm_model::{ChallengeQuestion, SecurityChallenge};

use crate::common::{CAMPUS_PEOPLE, TestEnv, secret};

fn answer(
    challenge: SecurityChallenge,
    answers: &[(&str, &str)],
) -> anyhow::Result<SecurityChallenge> {
    let mut challenge = challenge;
    for (attribute, value) in answers {
        challenge = challenge.answer(attribute, *value)?;
    }
    Ok(challenge)
}

const CAMPUS_ANSWERS: [(&str, &str); 3] = [
    ("pmBirthCity", "Lyon"),
    ("pmPet", "rex"),
    ("pmAnswer1", "Mrs Smith"),
];

/// Tests that default questions come first, followed by the custom question.
#[tokio::test]
async fn test_challenge_composition() -> anyhow::Result<()> {
    let env = TestEnv::new();
    env.add_campus_user("asmith", "pw");

    let challenge = env.manager.security_challenge("asmith").await?;

    let questions: Vec<(&str, &str)> = challenge
        .questions()
        .iter()
        .map(|q| (q.prompt.as_str(), q.answer_attribute.as_str()))
        .collect();
    assert_eq!(
        questions,
        [
            ("In which city were you born?", "pmBirthCity"),
            ("Name of your first pet?", "pmPet"),
            ("Favourite teacher?", "pmAnswer1"),
        ]
    );
    Ok(())
}

/// Tests that the first directory knowing the user provides the challenge.
#[tokio::test]
async fn test_corp_challenge_wins() -> anyhow::Result<()> {
    let env = TestEnv::new();
    env.add_corp_user("jdoe", "pw");

    let challenge = env.manager.security_challenge("jdoe").await?;

    assert_eq!(challenge.len(), 1);
    assert_eq!(env.campus.opened(), 0);
    Ok(())
}

/// Tests that a user without a stored custom prompt is a configuration error.
#[tokio::test]
async fn test_missing_custom_prompt() -> anyhow::Result<()> {
    let env = TestEnv::new();
    env.campus.add_user(
        &format!("uid=bob,{CAMPUS_PEOPLE}"),
        &[("objectClass", "inetOrgPerson"), ("uid", "bob")],
        "pw",
    );

    let result = env.manager.security_challenge("bob").await;

    assert!(
        matches!(result, Err(PasswordManagerError::Configuration(_))),
        "Expected configuration error, got {result:?}"
    );
    Ok(())
}

/// Tests checking single answers and whole challenges.
#[tokio::test]
async fn test_verify_answers() -> anyhow::Result<()> {
    let env = TestEnv::new();
    env.add_campus_user("asmith", "pw");
    let challenges = env.manager.challenges();

    let pet = ChallengeQuestion::new("Name of your first pet?", "pmPet");
    assert!(challenges.verify_answer("asmith", &pet.clone().with_answer("rex")).await?);
    assert!(!challenges.verify_answer("asmith", &pet.clone().with_answer("tom")).await?);
    assert!(matches!(
        challenges.verify_answer("asmith", &pet).await,
        Err(PasswordManagerError::MissingAnswer)
    ));

    let challenge = env.manager.security_challenge("asmith").await?;
    let correct = answer(challenge.clone(), &CAMPUS_ANSWERS)?;
    assert!(challenges.verify_challenge(&correct).await?);

    let wrong = answer(
        challenge.clone(),
        &[("pmBirthCity", "Lyon"), ("pmPet", "tom"), ("pmAnswer1", "Mrs Smith")],
    )?;
    assert!(!challenges.verify_challenge(&wrong).await?);

    let partial = answer(challenge, &[("pmPet", "rex")])?;
    assert!(matches!(
        challenges.verify_challenge(&partial).await,
        Err(PasswordManagerError::MissingAnswer)
    ));
    Ok(())
}

/// Tests a password reset after answering every question.
#[tokio::test]
async fn test_reset_password_with_answers() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let dn = env.add_campus_user("asmith", "forgotten");

    let challenge = env.manager.security_challenge("asmith").await?;
    let answered = answer(challenge, &CAMPUS_ANSWERS)?;

    assert!(env.manager.reset_password(&answered, &secret("fresh")).await?);
    assert!(env.campus.has_password(&dn, "fresh"));
    Ok(())
}

/// Tests that wrong answers count towards the lockout.
#[tokio::test]
async fn test_wrong_answers_lock_reset() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let dn = env.add_campus_user("asmith", "forgotten");
    let challenge = env.manager.security_challenge("asmith").await?;
    let wrong = answer(
        challenge.clone(),
        &[("pmBirthCity", "Paris"), ("pmPet", "rex"), ("pmAnswer1", "Mrs Smith")],
    )?;

    for attempt in 1..=3 {
        assert!(!env.manager.reset_password(&wrong, &secret("fresh")).await?);
        assert_eq!(env.failures("asmith"), attempt);
    }

    let correct = answer(challenge, &CAMPUS_ANSWERS)?;
    let result = env.manager.reset_password(&correct, &secret("fresh")).await;
    assert!(matches!(result, Err(PasswordManagerError::LockedOut { .. })));
    assert!(env.campus.has_password(&dn, "forgotten"));
    Ok(())
}

/// Tests storing new answers and a new custom prompt.
#[tokio::test]
async fn test_store_answers() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let dn = env.add_campus_user("asmith", "pw");
    let challenge = env.manager.security_challenge("asmith").await?;

    let questions = challenge
        .questions()
        .iter()
        .cloned()
        .map(|q| match q.answer_attribute.as_str() {
            "pmPet" => q.with_answer("felix"),
            "pmAnswer1" => ChallengeQuestion::new("First concert?", "pmAnswer1").with_answer("Blur"),
            _ => q,
        })
        .collect();
    let updated = SecurityChallenge::new(challenge.username().clone(), questions)?;

    env.manager.challenges().store_challenge(&updated).await?;

    assert_eq!(env.campus.value(&dn, "pmPet").as_deref(), Some("felix"));
    assert_eq!(env.campus.value(&dn, "pmBirthCity").as_deref(), Some("Lyon"));
    assert_eq!(env.campus.value(&dn, "pmQuestion1").as_deref(), Some("First concert?"));

    let refreshed = env.manager.security_challenge("asmith").await?;
    assert_eq!(refreshed.questions()[2].prompt, "First concert?");
    Ok(())
}
