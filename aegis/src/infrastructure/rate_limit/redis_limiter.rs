// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::error::AegisError;
use aegis_domain::repositories::{HealthCheck, RateLimitDecision};
use aegis_domain::RateLimiter;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use std::time::{SystemTime, UNIX_EPOCH};

/// A ZSET-based sliding-window log, scored by hit timestamp: each check
/// drops entries older than the window, then admits the call only if
/// fewer than `times` remain. `times` is the quota per `seconds`-wide
/// window.
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    key_prefix: &'static str,
    times: u32,
    seconds: u64,
}

/// Atomically prunes expired hits, and on success adds the current one.
/// Returns `{allowed, count_after, retry_after_secs}`.
fn sliding_window_log_script() -> Script {
    Script::new(
        r#"
        local key = KEYS[1]
        local now = tonumber(ARGV[1])
        local window = tonumber(ARGV[2])
        local limit = tonumber(ARGV[3])

        redis.call('ZREMRANGEBYSCORE', key, 0, now - window)
        local current = redis.call('ZCARD', key)

        if current < limit then
            redis.call('ZADD', key, now, now .. '-' .. redis.call('INCR', key .. ':seq'))
            redis.call('EXPIRE', key, window)
            redis.call('EXPIRE', key .. ':seq', window)
            return {1, current + 1, 0}
        else
            local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
            local oldest_score = oldest[2] and tonumber(oldest[2]) or now
            local retry_after = oldest_score + window - now
            if retry_after < 0 then retry_after = 0 end
            return {0, current, retry_after}
        end
        "#,
    )
}

impl RedisRateLimiter {
    pub fn new(conn: ConnectionManager, key_prefix: &'static str, times: u32, seconds: u64) -> Self {
        Self { conn, key_prefix, times, seconds }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str) -> RateLimitDecision {
        let redis_key = format!("ratelimit:{}:{key}", self.key_prefix);
        let mut conn = self.conn.clone();
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();

        let result: Result<Vec<i64>, redis::RedisError> =
            sliding_window_log_script().key(&redis_key).arg(now).arg(self.seconds).arg(self.times).invoke_async(&mut conn).await;

        let Ok(result) = result else {
            // Fail open: a Redis outage should not block ingestion entirely;
            // the collector's own timeout/circuit-breaking handles that case.
            return RateLimitDecision::Allow { remaining: self.times };
        };

        match result[..] {
            [1, count, _] => RateLimitDecision::Allow { remaining: self.times.saturating_sub(count as u32) },
            [0, _, retry_after] => RateLimitDecision::Reject { retry_after_secs: retry_after.max(0) as u64 },
            _ => RateLimitDecision::Allow { remaining: self.times },
        }
    }
}

#[async_trait]
impl HealthCheck for RedisRateLimiter {
    fn component(&self) -> &'static str {
        "cache"
    }

    async fn ping(&self) -> Result<(), AegisError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AegisError::upstream_unavailable(format!("redis ping failed: {e}")))?;
        Ok(())
    }
}
