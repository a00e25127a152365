// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::error::AegisError;
use aegis_domain::repositories::LoginAttemptTracker;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Window {
    count: u32,
    started_at: Instant,
    ttl: Duration,
}

/// A per-username failure counter with no external dependency, for tests
/// and local runs without Redis.
#[derive(Default)]
pub struct InMemoryLoginAttemptTracker {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryLoginAttemptTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoginAttemptTracker for InMemoryLoginAttemptTracker {
    async fn failure_count(&self, username: &str) -> Result<u32, AegisError> {
        let mut windows = self.windows.lock();
        let now = Instant::now();
        match windows.get(username) {
            Some(entry) if now.duration_since(entry.started_at) < entry.ttl => Ok(entry.count),
            Some(_) => {
                windows.remove(username);
                Ok(0)
            }
            None => Ok(0),
        }
    }

    async fn record_failure(&self, username: &str, ttl_seconds: u64) -> Result<u32, AegisError> {
        let mut windows = self.windows.lock();
        let now = Instant::now();
        let ttl = Duration::from_secs(ttl_seconds);
        let entry = windows.entry(username.to_string()).or_insert(Window { count: 0, started_at: now, ttl });

        if now.duration_since(entry.started_at) >= entry.ttl {
            entry.count = 0;
            entry.started_at = now;
            entry.ttl = ttl;
        }
        entry.count += 1;
        Ok(entry.count)
    }

    async fn clear(&self, username: &str) -> Result<(), AegisError> {
        self.windows.lock().remove(username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_accumulate_within_the_window() {
        let tracker = InMemoryLoginAttemptTracker::new();
        assert_eq!(tracker.record_failure("alice", 900).await.unwrap(), 1);
        assert_eq!(tracker.record_failure("alice", 900).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn clear_resets_the_counter() {
        let tracker = InMemoryLoginAttemptTracker::new();
        tracker.record_failure("alice", 900).await.unwrap();
        tracker.clear("alice").await.unwrap();
        assert_eq!(tracker.record_failure("alice", 900).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn separate_usernames_have_separate_counters() {
        let tracker = InMemoryLoginAttemptTracker::new();
        assert_eq!(tracker.record_failure("alice", 900).await.unwrap(), 1);
        assert_eq!(tracker.record_failure("bob", 900).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failure_count_is_zero_for_an_unseen_username() {
        let tracker = InMemoryLoginAttemptTracker::new();
        assert_eq!(tracker.failure_count("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failure_count_reflects_recorded_failures() {
        let tracker = InMemoryLoginAttemptTracker::new();
        tracker.record_failure("alice", 900).await.unwrap();
        tracker.record_failure("alice", 900).await.unwrap();
        assert_eq!(tracker.failure_count("alice").await.unwrap(), 2);
    }
}
