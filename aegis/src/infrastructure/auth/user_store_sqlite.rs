// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::User;
use aegis_domain::error::AegisError;
use aegis_domain::services::auth::UserStore;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::BTreeSet;

/// Production [`UserStore`], backed by a `users` table in the same
/// SQLite database used for playbook run history. Scopes are persisted
/// as a comma-joined column rather than a normalized join table — the
/// scope set per user is small and read far more often than written.
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), AegisError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                scopes TEXT NOT NULL,
                disabled INTEGER NOT NULL DEFAULT 0,
                credential_hash TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AegisError::internal(format!("user table migration failed: {e}")))?;
        Ok(())
    }

    pub async fn upsert(&self, user: &User) -> Result<(), AegisError> {
        let scopes = user.scopes.iter().cloned().collect::<Vec<_>>().join(",");
        sqlx::query("INSERT INTO users (username, scopes, disabled, credential_hash) VALUES (?, ?, ?, ?) ON CONFLICT(username) DO UPDATE SET scopes = excluded.scopes, disabled = excluded.disabled, credential_hash = excluded.credential_hash")
            .bind(&user.username)
            .bind(&scopes)
            .bind(user.disabled)
            .bind(&user.credential_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| AegisError::internal(format!("user upsert failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AegisError> {
        let row = sqlx::query_as::<_, (String, String, bool, String)>("SELECT username, scopes, disabled, credential_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AegisError::internal(format!("user lookup failed: {e}")))?;

        Ok(row.map(|(username, scopes, disabled, credential_hash)| User {
            username,
            scopes: scopes.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect::<BTreeSet<_>>(),
            disabled,
            credential_hash,
        }))
    }
}
