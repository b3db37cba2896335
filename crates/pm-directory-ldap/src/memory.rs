//! In-memory directory.
//!
//! A [`DirectoryConnector`] backed by a map of entries, for tests and local
//! experiments. It understands equality filters joined by `&`, the three
//! search scopes, and reports failures with the result codes and diagnostic
//! texts a real server would use.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;

use crate::encoding::unicode_pwd;
use crate::error::{LdapError, LdapResult};
use crate::search::{LdapEntry, SearchScope, ldap_unescape};
use crate::session::{AttributeChange, DirectoryConnector, DirectorySession};

const NO_SUCH_OBJECT: u32 = 32;
const NO_SUCH_ATTRIBUTE: u32 = 16;
const ATTRIBUTE_EXISTS: u32 = 20;
const CONSTRAINT_VIOLATION: u32 = 19;
const INVALID_CREDENTIALS: u32 = 49;

/// Which server the directory imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Generic,
    ActiveDirectory,
}

#[derive(Debug, Clone, Default)]
struct MemoryEntry {
    dn: String,
    /// Keyed by lower-cased attribute name.
    attributes: BTreeMap<String, Vec<Vec<u8>>>,
}

#[derive(Debug)]
struct State {
    flavor: Flavor,
    password_attribute: String,
    /// Keyed by lower-cased DN.
    entries: BTreeMap<String, MemoryEntry>,
    unavailable: Option<String>,
    write_failure: Option<(u32, String)>,
    opened: usize,
    open_sessions: usize,
}

/// An in-memory directory server.
///
/// Clones share the same data.
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    state: Arc<Mutex<State>>,
}

impl MemoryDirectory {
    /// Creates an empty generic directory storing passwords in `userPassword`.
    #[must_use]
    pub fn generic() -> Self {
        Self::with_flavor(Flavor::Generic, "userPassword")
    }

    /// Creates an empty Active Directory imitation storing passwords in
    /// `unicodePwd`.
    ///
    /// A password change whose old value does not match fails the way Active
    /// Directory does (result 19, sub-code `00000056`).
    #[must_use]
    pub fn active_directory() -> Self {
        Self::with_flavor(Flavor::ActiveDirectory, "unicodePwd")
    }

    fn with_flavor(flavor: Flavor, password_attribute: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                flavor,
                password_attribute: password_attribute.to_string(),
                entries: BTreeMap::new(),
                unavailable: None,
                write_failure: None,
                opened: 0,
                open_sessions: 0,
            })),
        }
    }

    /// Adds (or replaces) an entry with text attributes.
    pub fn add_entry(&self, dn: &str, attributes: &[(&str, &str)]) {
        let mut entry = MemoryEntry {
            dn: dn.to_string(),
            attributes: BTreeMap::new(),
        };
        for (name, value) in attributes {
            entry
                .attributes
                .entry(name.to_ascii_lowercase())
                .or_default()
                .push(value.as_bytes().to_vec());
        }
        self.state.lock().entries.insert(dn.to_ascii_lowercase(), entry);
    }

    /// Adds a user entry holding `password` in the password attribute,
    /// encoded the way the imitated server stores it.
    pub fn add_user(&self, dn: &str, attributes: &[(&str, &str)], password: &str) {
        self.add_entry(dn, attributes);
        let mut state = self.state.lock();
        let value = state.encode_password(password);
        let attribute = state.password_attribute.to_ascii_lowercase();
        if let Some(entry) = state.entries.get_mut(&dn.to_ascii_lowercase()) {
            entry.attributes.insert(attribute, vec![value]);
        }
    }

    /// Returns the raw values of an attribute.
    #[must_use]
    pub fn values(&self, dn: &str, attribute: &str) -> Option<Vec<Vec<u8>>> {
        self.state
            .lock()
            .entries
            .get(&dn.to_ascii_lowercase())
            .and_then(|e| e.attributes.get(&attribute.to_ascii_lowercase()))
            .cloned()
    }

    /// Returns the first value of an attribute as text.
    #[must_use]
    pub fn value(&self, dn: &str, attribute: &str) -> Option<String> {
        self.values(dn, attribute)
            .and_then(|v| v.into_iter().next())
            .map(|v| String::from_utf8_lossy(&v).into_owned())
    }

    /// Returns true if `password` is the user's current password.
    #[must_use]
    pub fn has_password(&self, dn: &str, password: &str) -> bool {
        let state = self.state.lock();
        let value = state.encode_password(password);
        state
            .password_values(&dn.to_ascii_lowercase())
            .is_some_and(|values| values.contains(&value))
    }

    /// Makes every `open` fail with a connection error, or clears the failure.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.state.lock().unavailable = reason.map(str::to_string);
    }

    /// Makes every write fail with the given result, or clears the failure.
    pub fn fail_writes_with(&self, failure: Option<(u32, &str)>) {
        self.state.lock().write_failure = failure.map(|(code, text)| (code, text.to_string()));
    }

    /// Sessions opened so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }

    /// Sessions currently open.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.state.lock().open_sessions
    }
}

impl State {
    fn encode_password(&self, password: &str) -> Vec<u8> {
        match self.flavor {
            Flavor::ActiveDirectory => unicode_pwd(password),
            Flavor::Generic => password.as_bytes().to_vec(),
        }
    }

    fn password_values(&self, key: &str) -> Option<&Vec<Vec<u8>>> {
        self.entries
            .get(key)
            .and_then(|e| e.attributes.get(&self.password_attribute.to_ascii_lowercase()))
    }

    fn entry(&self, dn: &str) -> LdapResult<&MemoryEntry> {
        self.entries
            .get(&dn.to_ascii_lowercase())
            .ok_or_else(|| no_such_object(dn))
    }

    fn check_writable(&self) -> LdapResult<()> {
        match &self.write_failure {
            Some((code, text)) => Err(LdapError::native(*code, text.clone())),
            None => Ok(()),
        }
    }

    fn apply(&self, entry: &mut MemoryEntry, change: AttributeChange) -> LdapResult<()> {
        match change {
            AttributeChange::Add { attribute, values } => {
                let current = entry.attributes.entry(attribute.to_ascii_lowercase()).or_default();
                for value in values {
                    if current.contains(&value) {
                        return Err(LdapError::native(
                            ATTRIBUTE_EXISTS,
                            format!("modify/add: {attribute}: value #0 already exists"),
                        ));
                    }
                    current.push(value);
                }
            }
            AttributeChange::Delete { attribute, values } => {
                let key = attribute.to_ascii_lowercase();
                let Some(current) = entry.attributes.get_mut(&key) else {
                    return Err(self.missing_value(&attribute));
                };
                if values.is_empty() {
                    entry.attributes.remove(&key);
                    return Ok(());
                }
                for value in values {
                    let Some(index) = current.iter().position(|v| *v == value) else {
                        return Err(self.missing_value(&attribute));
                    };
                    current.remove(index);
                }
                if current.is_empty() {
                    entry.attributes.remove(&key);
                }
            }
            AttributeChange::Replace { attribute, values } => {
                let key = attribute.to_ascii_lowercase();
                if values.is_empty() {
                    entry.attributes.remove(&key);
                } else {
                    entry.attributes.insert(key, values);
                }
            }
        }
        Ok(())
    }

    fn missing_value(&self, attribute: &str) -> LdapError {
        if self.flavor == Flavor::ActiveDirectory
            && attribute.eq_ignore_ascii_case(&self.password_attribute)
        {
            LdapError::native(
                CONSTRAINT_VIOLATION,
                "00000056: AtrErr: DSID-03190F80, #1:\n\t0: 00000056: DSID-03190F80, problem 1005 (CONSTRAINT_ATT_TYPE), data 0, Att 9005a (unicodePwd)",
            )
        } else {
            LdapError::native(NO_SUCH_ATTRIBUTE, format!("modify/delete: {attribute}: no such value"))
        }
    }
}

fn no_such_object(dn: &str) -> LdapError {
    LdapError::native(
        NO_SUCH_OBJECT,
        format!("0000208D: NameErr: DSID-03100241, problem 2001 (NO_OBJECT), best match of: '{dn}'"),
    )
}

fn invalid_credentials() -> LdapError {
    LdapError::native(
        INVALID_CREDENTIALS,
        "80090308: LdapErr: DSID-0C09044E, comment: AcceptSecurityContext error, data 52e, v4563",
    )
}

#[async_trait]
impl DirectoryConnector for MemoryDirectory {
    async fn open(&self) -> LdapResult<Box<dyn DirectorySession>> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.unavailable {
            return Err(LdapError::connection(reason.clone()));
        }
        state.opened += 1;
        state.open_sessions += 1;
        drop(state);

        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<State>>,
    closed: bool,
}

impl MemorySession {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut state = self.state.lock();
            state.open_sessions = state.open_sessions.saturating_sub(1);
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Equality terms of a filter, e.g. `(&(objectClass=person)(uid=jdoe))`.
///
/// A `None` value is a presence test (`(attr=*)`).
fn filter_terms(filter: &str) -> Vec<(String, Option<String>)> {
    let Ok(term) = Regex::new(r"\(([^()=&|!]+)=([^()]*)\)") else {
        return Vec::new();
    };
    term.captures_iter(filter)
        .map(|caps| {
            let value = (&caps[2] != "*").then(|| ldap_unescape(&caps[2]));
            (caps[1].to_ascii_lowercase(), value)
        })
        .collect()
}

fn matches_filter(entry: &MemoryEntry, terms: &[(String, Option<String>)]) -> bool {
    terms.iter().all(|(name, expected)| {
        entry.attributes.get(name).is_some_and(|values| match expected {
            None => true,
            Some(expected) => values
                .iter()
                .any(|v| String::from_utf8_lossy(v).eq_ignore_ascii_case(expected)),
        })
    })
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    let dn = dn.to_ascii_lowercase();
    let base = base.to_ascii_lowercase();
    if dn == base {
        return scope != SearchScope::OneLevel;
    }
    let Some(rdns) = dn.strip_suffix(&base).and_then(|rest| rest.strip_suffix(',')) else {
        return false;
    };
    match scope {
        SearchScope::Base => false,
        SearchScope::OneLevel => !rdns.contains(','),
        SearchScope::Subtree => true,
    }
}

fn to_ldap_entry(entry: &MemoryEntry, attributes: &[&str]) -> LdapEntry {
    let all = attributes.is_empty() || attributes.contains(&"*");
    let mut result = LdapEntry::new(entry.dn.clone());
    for (name, values) in &entry.attributes {
        if !all && !attributes.iter().any(|a| a.eq_ignore_ascii_case(name)) {
            continue;
        }
        let text: Option<Vec<String>> = values
            .iter()
            .map(|v| String::from_utf8(v.clone()).ok())
            .collect();
        match text {
            Some(text) => {
                result.attributes.insert(name.clone(), text);
            }
            None => {
                result.binary_attributes.insert(name.clone(), values.clone());
            }
        }
    }
    result
}

#[async_trait]
impl DirectorySession for MemorySession {
    async fn search_entry(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> LdapResult<Vec<LdapEntry>> {
        let state = self.state.lock();
        let base_exists = state.entries.contains_key(&base.to_ascii_lowercase())
            || state.entries.keys().any(|dn| in_scope(dn, base, SearchScope::Subtree));
        if !base_exists {
            return Err(no_such_object(base));
        }

        let terms = filter_terms(filter);
        Ok(state
            .entries
            .values()
            .filter(|e| in_scope(&e.dn, base, scope) && matches_filter(e, &terms))
            .map(|e| to_ldap_entry(e, attributes))
            .collect())
    }

    async fn modify(&mut self, dn: &str, changes: Vec<AttributeChange>) -> LdapResult<()> {
        let mut state = self.state.lock();
        let mut updated = state.entry(dn)?.clone();
        for change in changes {
            state.apply(&mut updated, change)?;
        }
        state.check_writable()?;
        state.entries.insert(dn.to_ascii_lowercase(), updated);
        Ok(())
    }

    async fn compare(&mut self, dn: &str, attribute: &str, value: &[u8]) -> LdapResult<bool> {
        let state = self.state.lock();
        let entry = state.entry(dn)?;
        match entry.attributes.get(&attribute.to_ascii_lowercase()) {
            Some(values) => Ok(values.iter().any(|v| v == value)),
            None => Err(LdapError::native(
                NO_SUCH_ATTRIBUTE,
                format!("compare: {attribute}: no such attribute"),
            )),
        }
    }

    async fn password_modify(&mut self, dn: &str, old: Option<&str>, new: &str) -> LdapResult<()> {
        let mut state = self.state.lock();
        let key = dn.to_ascii_lowercase();
        state.entry(dn)?;

        if let Some(old) = old {
            let old = state.encode_password(old);
            if !state.password_values(&key).is_some_and(|v| v.contains(&old)) {
                return Err(invalid_credentials());
            }
        }
        state.check_writable()?;

        let value = state.encode_password(new);
        let attribute = state.password_attribute.to_ascii_lowercase();
        if let Some(entry) = state.entries.get_mut(&key) {
            entry.attributes.insert(attribute, vec![value]);
        }
        Ok(())
    }

    async fn bind(&mut self, dn: &str, password: &str) -> LdapResult<()> {
        let state = self.state.lock();
        let value = state.encode_password(password);
        if state
            .password_values(&dn.to_ascii_lowercase())
            .is_some_and(|v| v.contains(&value))
        {
            Ok(())
        } else {
            Err(invalid_credentials())
        }
    }

    async fn close(&mut self) -> LdapResult<()> {
        self.release();
        Ok(())
    }
}
