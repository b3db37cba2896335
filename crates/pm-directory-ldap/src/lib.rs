//! # pm-directory-ldap
//!
//! LDAP implementation of [`pm_directory::DirectoryBackend`] using `ldap3`.
//!
//! Two directory families are supported:
//!
//! - **Active Directory**: passwords are changed with a single modify request
//!   that deletes the old `unicodePwd` value and adds the new one
//! - **Generic** (OpenLDAP and other RFC 4510 servers): passwords are changed
//!   with the RFC 3062 Password Modify extended operation, or optionally by
//!   binding as the user and replacing the password attribute
//!
//! Every operation opens its own connection through a
//! [`DirectoryConnector`], bound with the service account, and closes it
//! before returning. Only LDAPS is accepted.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod active_directory;
pub mod config;
pub mod connection;
pub mod directory;
pub mod encoding;
pub mod error;
mod generic;
pub mod memory;
pub mod search;
pub mod session;

pub use config::{
    ChangeMode, CustomQuestion, DefaultQuestion, LdapBackendConfig, LdapBackendConfigBuilder,
    LdapVendor, UsernameTransform,
};
pub use connection::LdapConnector;
pub use directory::{LdapDirectory, backend_chain};
pub use encoding::PasswordHash;
pub use error::{LdapError, LdapResult};
pub use memory::MemoryDirectory;
pub use search::{LdapEntry, SearchScope, ldap_escape};
pub use session::{AttributeChange, DirectoryConnector, DirectorySession};
