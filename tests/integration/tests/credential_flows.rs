//! Credential change flows against spy backends.

use pm_directory::PasswordManagerError;
use pm_model::Username;

use crate::common::{Reply, SpyBackend, init_tracing, manager, secret, spy_chain};

const WRONG_OLD: Reply = Reply::Native(49, "80090308: LdapErr: DSID-0C09044E, comment: AcceptSecurityContext error, data 52e, v4563");

/// Tests that a locked user never reaches a directory.
#[tokio::test]
async fn test_lockout_stops_before_directory() -> anyhow::Result<()> {
    init_tracing();
    let backend = SpyBackend::new("primary", WRONG_OLD);
    let manager = manager(spy_chain(&[&backend]), 3);

    for _ in 0..3 {
        let result = manager.change_password("jdoe", &secret("guess"), &secret("n3w")).await;
        assert!(matches!(result, Err(PasswordManagerError::InvalidOldCredential)));
    }
    assert_eq!(backend.calls(), 3);

    let result = manager.change_password("jdoe", &secret("guess"), &secret("n3w")).await;
    assert!(
        matches!(result, Err(PasswordManagerError::LockedOut { .. })),
        "Fourth attempt should be locked out, got {result:?}"
    );
    assert_eq!(backend.calls(), 3, "Locked user must not reach the directory");

    let other = manager.change_password("asmith", &secret("guess"), &secret("n3w")).await;
    assert!(matches!(other, Err(PasswordManagerError::InvalidOldCredential)));
    Ok(())
}

/// Tests that backends are tried in order and a hit ends the walk.
#[tokio::test]
async fn test_failover_skips_unknown_user() -> anyhow::Result<()> {
    init_tracing();
    let a = SpyBackend::new("a", Reply::NotFound);
    let b = SpyBackend::new("b", Reply::Ok);
    let c = SpyBackend::new("c", Reply::Ok);
    let manager = manager(spy_chain(&[&a, &b, &c]), 3);

    manager.change_password("jdoe", &secret("old"), &secret("n3w")).await?;

    assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    Ok(())
}

/// Tests that an outage fails over to the next backend.
#[tokio::test]
async fn test_failover_past_unavailable_backend() -> anyhow::Result<()> {
    init_tracing();
    let down = SpyBackend::new("down", Reply::Unavailable);
    let busy = SpyBackend::new("busy", Reply::Native(51, "server is busy"));
    let up = SpyBackend::new("up", Reply::Ok);
    let manager = manager(spy_chain(&[&down, &busy, &up]), 3);

    manager.change_password("jdoe", &secret("old"), &secret("n3w")).await?;

    assert_eq!((down.calls(), busy.calls(), up.calls()), (1, 1, 1));
    Ok(())
}

/// Tests that a wrong old password stops the walk and counts as a failure.
#[tokio::test]
async fn test_invalid_old_credential_is_terminal() -> anyhow::Result<()> {
    init_tracing();
    let a = SpyBackend::new(
        "a",
        Reply::Native(19, "00000056: AtrErr: DSID-03190F80, #1:\n\t0: 00000056: DSID-03190F80, problem 1005 (CONSTRAINT_ATT_TYPE)"),
    );
    let b = SpyBackend::new("b", Reply::Ok);
    let manager = manager(spy_chain(&[&a, &b]), 3);

    let result = manager.change_password("jdoe", &secret("guess"), &secret("n3w")).await;

    assert!(matches!(result, Err(PasswordManagerError::InvalidOldCredential)));
    assert_eq!(b.calls(), 0, "Terminal failure must not fail over");
    let jdoe = Username::new("jdoe")?;
    assert_eq!(manager.credentials().limiter().failure_count(&jdoe), 1);
    Ok(())
}

/// Tests that a password policy rejection reaches the caller with its reason.
#[tokio::test]
async fn test_policy_violation_is_reported() -> anyhow::Result<()> {
    init_tracing();
    let a = SpyBackend::new(
        "a",
        Reply::Native(19, "LDAP: error code 19 - 0000052D: Constraint violation - check_password_restrictions"),
    );
    let b = SpyBackend::new("b", Reply::Ok);
    let manager = manager(spy_chain(&[&a, &b]), 3);

    let result = manager.change_password("jdoe", &secret("old"), &secret("short")).await;

    assert!(
        matches!(result, Err(PasswordManagerError::PolicyViolation { reason: Some(_) })),
        "Expected policy violation, got {result:?}"
    );
    assert_eq!(b.calls(), 0);
    Ok(())
}

/// Tests that an unknown sub-code is treated as transient.
#[tokio::test]
async fn test_unknown_diagnostic_fails_over() -> anyhow::Result<()> {
    init_tracing();
    let a = SpyBackend::new("a", Reply::Native(19, "LDAP: error code 19 - FFFFFFFF: something odd"));
    let b = SpyBackend::new("b", Reply::Ok);
    let manager = manager(spy_chain(&[&a, &b]), 3);

    manager.change_password("jdoe", &secret("old"), &secret("n3w")).await?;

    assert_eq!(b.calls(), 1);
    Ok(())
}

/// Tests exhaustion when no backend knows the user.
#[tokio::test]
async fn test_unknown_user_everywhere() -> anyhow::Result<()> {
    init_tracing();
    let a = SpyBackend::new("a", Reply::NotFound);
    let b = SpyBackend::new("b", Reply::NotFound);
    let manager = manager(spy_chain(&[&a, &b]), 3);

    let result = manager.change_password("ghost", &secret("old"), &secret("n3w")).await;

    assert!(matches!(result, Err(PasswordManagerError::UserNotFound)));
    let ghost = Username::new("ghost")?;
    assert_eq!(manager.credentials().limiter().failure_count(&ghost), 1);
    Ok(())
}

/// Tests exhaustion when a backend could not be asked.
#[tokio::test]
async fn test_exhaustion_with_outage_is_unavailable() -> anyhow::Result<()> {
    init_tracing();
    let a = SpyBackend::new("a", Reply::NotFound);
    let b = SpyBackend::new("b", Reply::Unavailable);
    let manager = manager(spy_chain(&[&a, &b]), 3);

    let result = manager.change_password("jdoe", &secret("old"), &secret("n3w")).await;

    assert!(matches!(result, Err(PasswordManagerError::BackendUnavailable)));
    Ok(())
}

/// Tests that administrative resets bypass the limiter.
#[tokio::test]
async fn test_set_credential_ignores_lockout() -> anyhow::Result<()> {
    init_tracing();
    let failing = SpyBackend::new("failing", WRONG_OLD);
    let manager = manager(spy_chain(&[&failing]), 1);
    let _ = manager.change_password("jdoe", &secret("guess"), &secret("n3w")).await;
    let jdoe = Username::new("jdoe")?;
    assert!(manager.credentials().limiter().is_locked(&jdoe));

    let ok = SpyBackend::new("ok", Reply::Ok);
    let reset = crate::common::manager(spy_chain(&[&ok]), 1);
    reset.credentials().set_credential("jdoe", &secret("n3w")).await?;
    assert_eq!(ok.calls(), 1);
    Ok(())
}

/// Tests that blank usernames are rejected before any directory call.
#[tokio::test]
async fn test_blank_username_is_invalid() -> anyhow::Result<()> {
    init_tracing();
    let backend = SpyBackend::new("primary", Reply::Ok);
    let manager = manager(spy_chain(&[&backend]), 3);

    let result = manager.change_password("  ", &secret("old"), &secret("n3w")).await;

    assert!(matches!(result, Err(PasswordManagerError::InvalidUsername)));
    assert_eq!(backend.calls(), 0);
    Ok(())
}
