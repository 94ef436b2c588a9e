//! Credential storage
//!
//! A fixed username -> password table built once at startup and shared by
//! reference with every session. Comparison is exact and case-sensitive on
//! both fields. Passwords are held in plain text: a deployment facing real
//! users must store salted hashes instead, keeping the same
//! `check_password(user, password) -> bool` contract.

use std::collections::HashMap;

use crate::config::UserEntry;

#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a UserEntry>) -> Self {
        let users = entries
            .into_iter()
            .map(|entry| (entry.name.clone(), entry.password.clone()))
            .collect();
        Self { users }
    }

    /// Returns true only if `user` exists and `password` matches exactly.
    pub fn check_password(&self, user: &str, password: &str) -> bool {
        matches!(self.users.get(user), Some(stored) if stored == password)
    }
}
