// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::error::AegisError;
use aegis_domain::repositories::{HealthCheck, RateLimitDecision};
use aegis_domain::RateLimiter;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// A sliding-window log with no external dependency, for tests and local
/// runs without Redis — mirrors the ZSET-per-key shape of
/// [`crate::infrastructure::rate_limit::RedisRateLimiter`] with a
/// `VecDeque` of hit timestamps in place of Redis's sorted set.
pub struct InMemoryRateLimiter {
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
    times: u32,
    window: Duration,
}

impl InMemoryRateLimiter {
    pub fn new(times: u32, seconds: u64) -> Self {
        Self { hits: Mutex::new(HashMap::new()), times, window: Duration::from_secs(seconds) }
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str) -> RateLimitDecision {
        let mut hits = self.hits.lock();
        let now = Instant::now();
        let log = hits.entry(key.to_string()).or_default();

        while let Some(&oldest) = log.front() {
            if now.duration_since(oldest) >= self.window {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() as u32 >= self.times {
            let retry_after = log.front().map(|&oldest| self.window.saturating_sub(now.duration_since(oldest))).unwrap_or(self.window);
            return RateLimitDecision::Reject { retry_after_secs: retry_after.as_secs() };
        }

        log.push_back(now);
        RateLimitDecision::Allow { remaining: self.times - log.len() as u32 }
    }
}

#[async_trait]
impl HealthCheck for InMemoryRateLimiter {
    fn component(&self) -> &'static str {
        "cache"
    }

    async fn ping(&self) -> Result<(), AegisError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_quota_then_rejects() {
        let limiter = InMemoryRateLimiter::new(2, 60);
        assert_eq!(limiter.check("a").await, RateLimitDecision::Allow { remaining: 1 });
        assert_eq!(limiter.check("a").await, RateLimitDecision::Allow { remaining: 0 });
        assert!(matches!(limiter.check("a").await, RateLimitDecision::Reject { .. }), "remaining hit 0 on the previous request, this one must be rejected");
    }

    #[tokio::test]
    async fn separate_keys_have_separate_quotas() {
        let limiter = InMemoryRateLimiter::new(1, 60);
        assert_eq!(limiter.check("a").await, RateLimitDecision::Allow { remaining: 0 });
        assert_eq!(limiter.check("b").await, RateLimitDecision::Allow { remaining: 0 });
    }

    #[tokio::test]
    async fn health_check_reports_component_and_is_always_ok() {
        let limiter = InMemoryRateLimiter::new(1, 60);
        assert_eq!(limiter.component(), "cache");
        assert!(limiter.ping().await.is_ok());
    }
}
