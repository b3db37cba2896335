//! Password writes for RFC 4510 directories.

use crate::config::{ChangeMode, LdapBackendConfig};
use crate::encoding::attribute_value;
use crate::error::{LdapError, LdapResult};
use crate::session::{AttributeChange, DirectorySession};

/// Changes the password of `dn`, verifying `old`.
///
/// With [`ChangeMode::PasswordModify`] the server checks and writes in one
/// extended operation and applies its own storage scheme. With
/// [`ChangeMode::VerifyThenSet`] the session re-binds as the user and then
/// replaces the password attribute, hashed per `password_hash`.
pub(crate) async fn change_password(
    session: &mut dyn DirectorySession,
    config: &LdapBackendConfig,
    dn: &str,
    old: &str,
    new: &str,
) -> LdapResult<()> {
    match config.change_mode {
        ChangeMode::PasswordModify => session.password_modify(dn, Some(old), new).await,
        ChangeMode::VerifyThenSet => {
            // RFC 4513 treats an empty simple bind as unauthenticated.
            if old.is_empty() {
                return Err(LdapError::native(49, "empty password is an unauthenticated bind"));
            }
            session.bind(dn, old).await?;
            set_password(session, config, dn, new).await
        }
    }
}

/// Replaces the password attribute of `dn`.
pub(crate) async fn set_password(
    session: &mut dyn DirectorySession,
    config: &LdapBackendConfig,
    dn: &str,
    new: &str,
) -> LdapResult<()> {
    let value = attribute_value(new, config.password_hash);
    session
        .modify(dn, vec![AttributeChange::replace(config.password_attribute(), value)])
        .await
}
