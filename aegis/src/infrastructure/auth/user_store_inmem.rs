// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::User;
use aegis_domain::error::AegisError;
use aegis_domain::services::auth::UserStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory user directory for tests and local demo seeding. Never
/// used in production — [`crate::infrastructure::auth::SqliteUserStore`]
/// is the production implementation.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.users.write().insert(user.username.clone(), user);
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AegisError> {
        Ok(self.users.read().get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn returns_none_for_unknown_user() {
        let store = InMemoryUserStore::new();
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finds_inserted_user() {
        let store = InMemoryUserStore::new();
        store.insert(User::new("alice", BTreeSet::new(), "hash"));
        assert!(store.find_by_username("alice").await.unwrap().is_some());
    }
}
