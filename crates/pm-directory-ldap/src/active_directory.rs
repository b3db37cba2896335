//! Active Directory password writes.
//!
//! `unicodePwd` is write-only: a change is a single modify request deleting
//! the old value and adding the new one, which the server accepts only if
//! the deleted value matches the current password. An administrative reset
//! replaces the value outright.

use crate::encoding::unicode_pwd;
use crate::error::LdapResult;
use crate::session::{AttributeChange, DirectorySession};

/// Changes the password of `dn`, verifying `old` in the same request.
pub(crate) async fn change_password(
    session: &mut dyn DirectorySession,
    attribute: &str,
    dn: &str,
    old: &str,
    new: &str,
) -> LdapResult<()> {
    let changes = vec![
        AttributeChange::Delete {
            attribute: attribute.to_string(),
            values: vec![unicode_pwd(old)],
        },
        AttributeChange::Add {
            attribute: attribute.to_string(),
            values: vec![unicode_pwd(new)],
        },
    ];
    session.modify(dn, changes).await
}

/// Replaces the password of `dn`.
pub(crate) async fn set_password(
    session: &mut dyn DirectorySession,
    attribute: &str,
    dn: &str,
    new: &str,
) -> LdapResult<()> {
    session
        .modify(dn, vec![AttributeChange::replace(attribute, unicode_pwd(new))])
        .await
}
