//! Credential flows against in-memory LDAP directories.

use pm_directory::PasswordManagerError;

use crate::common::{TestEnv, secret};

/// Tests an Active Directory password change end-to-end.
#[tokio::test]
async fn test_active_directory_change() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let dn = env.add_corp_user("jdoe", "Winter2025!");

    env.manager
        .change_password("jdoe", &secret("Winter2025!"), &secret("Spring2026!"))
        .await?;

    assert!(env.corp.has_password(&dn, "Spring2026!"));
    assert_eq!(env.campus.opened(), 0, "Campus should not be consulted");
    assert_eq!(env.corp.open_sessions(), 0, "Sessions should be closed");
    Ok(())
}

/// Tests that a user unknown to the first directory is found in the second.
#[tokio::test]
async fn test_generic_user_after_corp_miss() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let dn = env.add_campus_user("asmith", "old-pass");

    env.manager
        .change_password("asmith", &secret("old-pass"), &secret("new-pass"))
        .await?;

    assert_eq!(env.corp.opened(), 1);
    assert!(env.campus.has_password(&dn, "new-pass"));
    assert_eq!(env.failures("asmith"), 0);
    Ok(())
}

/// Tests failover past a directory that cannot be reached.
#[tokio::test]
async fn test_corp_outage_fails_over() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let campus_dn = env.add_campus_user("asmith", "old-pass");
    env.add_corp_user("jdoe", "Winter2025!");
    env.corp.set_unavailable(Some("connection refused"));

    env.manager
        .change_password("asmith", &secret("old-pass"), &secret("new-pass"))
        .await?;
    assert!(env.campus.has_password(&campus_dn, "new-pass"));

    let result = env
        .manager
        .change_password("jdoe", &secret("Winter2025!"), &secret("Spring2026!"))
        .await;
    assert!(
        matches!(result, Err(PasswordManagerError::BackendUnavailable)),
        "Expected unavailable, got {result:?}"
    );
    assert_eq!(env.failures("jdoe"), 1);
    Ok(())
}

/// Tests that a wrong Active Directory password changes nothing and is counted.
#[tokio::test]
async fn test_active_directory_wrong_password() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let dn = env.add_corp_user("jdoe", "Winter2025!");

    let result = env
        .manager
        .change_password("jdoe", &secret("guess"), &secret("Spring2026!"))
        .await;

    assert!(matches!(result, Err(PasswordManagerError::InvalidOldCredential)));
    assert!(env.corp.has_password(&dn, "Winter2025!"));
    assert_eq!(env.campus.opened(), 0, "Terminal failure must not fail over");
    assert_eq!(env.failures("jdoe"), 1);
    Ok(())
}

/// Tests that a policy rejection from Active Directory reaches the caller.
#[tokio::test]
async fn test_active_directory_policy_violation() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let dn = env.add_corp_user("jdoe", "Winter2025!");
    env.corp.fail_writes_with(Some((
        19,
        "0000052D: Constraint violation - check_password_restrictions: the password was already used",
    )));

    let result = env
        .manager
        .change_password("jdoe", &secret("Winter2025!"), &secret("Winter2025!"))
        .await;

    assert!(matches!(result, Err(PasswordManagerError::PolicyViolation { .. })));
    assert!(env.corp.has_password(&dn, "Winter2025!"));
    Ok(())
}

/// Tests that a success followed by fewer failures than the threshold does not lock.
#[tokio::test]
async fn test_success_resets_failures() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let dn = env.add_campus_user("asmith", "first");

    env.manager
        .change_password("asmith", &secret("first"), &secret("second"))
        .await?;
    for _ in 0..2 {
        let result = env
            .manager
            .change_password("asmith", &secret("wrong"), &secret("third"))
            .await;
        assert!(matches!(result, Err(PasswordManagerError::InvalidOldCredential)));
    }
    assert_eq!(env.failures("asmith"), 2);

    env.manager
        .change_password("asmith", &secret("second"), &secret("third"))
        .await?;
    assert!(env.campus.has_password(&dn, "third"));
    assert_eq!(env.failures("asmith"), 0);
    Ok(())
}

/// Tests that the threshold locks a user against in-memory directories too.
#[tokio::test]
async fn test_threshold_locks_user() -> anyhow::Result<()> {
    let env = TestEnv::new();
    env.add_corp_user("jdoe", "Winter2025!");

    for _ in 0..3 {
        let _ = env
            .manager
            .change_password("jdoe", &secret("guess"), &secret("Spring2026!"))
            .await;
    }
    let opened = env.corp.opened();

    let result = env
        .manager
        .change_password("jdoe", &secret("Winter2025!"), &secret("Spring2026!"))
        .await;

    assert!(matches!(result, Err(PasswordManagerError::LockedOut { .. })));
    assert_eq!(env.corp.opened(), opened, "Locked user must not reach the directory");
    Ok(())
}

/// Tests an administrative reset on the generic directory.
#[tokio::test]
async fn test_set_password_without_old() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let dn = env.add_campus_user("asmith", "forgotten");

    env.manager
        .credentials()
        .set_credential("asmith", &secret("fresh"))
        .await?;

    assert!(env.campus.has_password(&dn, "fresh"));
    Ok(())
}
