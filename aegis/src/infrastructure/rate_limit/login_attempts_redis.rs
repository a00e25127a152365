// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::error::AegisError;
use aegis_domain::repositories::LoginAttemptTracker;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// `INCR` plus a first-failure `EXPIRE`, mirroring [`super::RedisRateLimiter`]'s
/// fixed-window counter but keyed by username and reset explicitly on a
/// successful login rather than on window rollover.
pub struct RedisLoginAttemptTracker {
    conn: ConnectionManager,
}

impl RedisLoginAttemptTracker {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn key(username: &str) -> String {
        format!("login_attempts:{username}")
    }
}

#[async_trait]
impl LoginAttemptTracker for RedisLoginAttemptTracker {
    async fn failure_count(&self, username: &str) -> Result<u32, AegisError> {
        let mut conn = self.conn.clone();
        let count: Option<i64> =
            conn.get(Self::key(username)).await.map_err(|e| AegisError::upstream_unavailable(format!("redis get failed: {e}")))?;
        Ok(count.unwrap_or(0) as u32)
    }

    async fn record_failure(&self, username: &str, ttl_seconds: u64) -> Result<u32, AegisError> {
        let mut conn = self.conn.clone();
        let key = Self::key(username);
        let count: i64 = conn.incr(&key, 1).await.map_err(|e| AegisError::upstream_unavailable(format!("redis incr failed: {e}")))?;
        if count == 1 {
            let _: Result<(), redis::RedisError> = conn.expire(&key, ttl_seconds as i64).await;
        }
        Ok(count as u32)
    }

    async fn clear(&self, username: &str) -> Result<(), AegisError> {
        let mut conn = self.conn.clone();
        let _: Result<(), redis::RedisError> = conn.del(Self::key(username)).await;
        Ok(())
    }
}
