//! End-to-End Integration Tests
//!
//! These tests drive the password manager through its public API against
//! spy backends and in-memory LDAP directories.

mod challenge_flows;
mod common;
mod credential_flows;
mod directory_flows;
