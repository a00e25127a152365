// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A principal that can authenticate against `/token` and, once bearing a
/// token, act within its granted scopes.
///
/// `credential_hash` holds an Argon2id PHC string, never a plaintext
/// password; this type never derives `Debug` output for it directly (the
/// field is excluded from the derived `Debug` impl below by hand-writing
/// it) so a stray `{:?}` in a log statement cannot leak a hash.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub scopes: BTreeSet<String>,
    pub disabled: bool,
    pub credential_hash: String,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("scopes", &self.scopes)
            .field("disabled", &self.disabled)
            .field("credential_hash", &"<redacted>")
            .finish()
    }
}

impl User {
    pub fn new(username: impl Into<String>, scopes: BTreeSet<String>, credential_hash: impl Into<String>) -> Self {
        Self { username: username.into(), scopes, disabled: false, credential_hash: credential_hash.into() }
    }

    pub fn can_authenticate(&self) -> bool {
        !self.disabled
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_user_cannot_authenticate() {
        let mut user = User::new("alice", BTreeSet::from(["logs:write".to_string()]), "hash");
        assert!(user.can_authenticate());
        user.disabled = true;
        assert!(!user.can_authenticate());
    }

    #[test]
    fn debug_redacts_credential_hash() {
        let user = User::new("alice", BTreeSet::new(), "super-secret-hash");
        let rendered = format!("{user:?}");
        assert!(!rendered.contains("super-secret-hash"));
    }
}
