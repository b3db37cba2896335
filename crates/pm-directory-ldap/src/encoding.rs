//! Password encodings written to directories.

use aws_lc_rs::digest;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

/// Encodes a password as an Active Directory `unicodePwd` value.
///
/// The value is the password surrounded by double quotes, encoded as
/// UTF-16 little-endian.
#[must_use]
pub fn unicode_pwd(password: &str) -> Vec<u8> {
    format!("\"{password}\"")
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Digest applied to passwords stored as attribute values.
///
/// Stored values use the RFC 2307 `{SCHEME}base64` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PasswordHash {
    /// SHA-1 (`{SHA}`), for directories that accept nothing stronger.
    #[serde(rename = "SHA", alias = "SHA1")]
    Sha1,
    /// SHA-256 (`{SHA256}`).
    #[serde(rename = "SHA256")]
    Sha256,
    /// SHA-384 (`{SHA384}`).
    #[serde(rename = "SHA384")]
    Sha384,
    /// SHA-512 (`{SHA512}`).
    #[serde(rename = "SHA512")]
    Sha512,
}

impl PasswordHash {
    /// Scheme tag written in braces before the digest.
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
        }
    }

    fn algorithm(&self) -> &'static digest::Algorithm {
        match self {
            Self::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => &digest::SHA256,
            Self::Sha384 => &digest::SHA384,
            Self::Sha512 => &digest::SHA512,
        }
    }

    /// Hashes a password into its stored form, e.g. `{SHA256}base64digest`.
    #[must_use]
    pub fn encode(&self, password: &str) -> String {
        let hashed = digest::digest(self.algorithm(), password.as_bytes());
        format!("{{{}}}{}", self.scheme(), STANDARD.encode(hashed.as_ref()))
    }
}

/// Encodes a password for a generic directory's password attribute.
#[must_use]
pub fn attribute_value(password: &str, hash: Option<PasswordHash>) -> Vec<u8> {
    match hash {
        Some(hash) => hash.encode(password).into_bytes(),
        None => password.as_bytes().to_vec(),
    }
}
