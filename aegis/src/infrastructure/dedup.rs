// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A bounded, TTL-aware LRU cache keyed by an arbitrary string, shared by
//! the Processor's deduplication step and the Detection Engine's
//! per-`(rule_id, fingerprint)` alert throttle — same cache shape, two
//! different keys and TTLs.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

struct Entry {
    inserted_at: Instant,
    ttl: Duration,
}

/// `true` from [`TtlLruCache::check_and_insert`] means "seen before,
/// within the TTL" (a duplicate / throttled match); `false` means "first
/// time, now recorded."
pub struct TtlLruCache {
    inner: Mutex<LruCache<String, Entry>>,
    default_ttl: Duration,
}

impl TtlLruCache {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self { inner: Mutex::new(LruCache::new(capacity)), default_ttl }
    }

    /// Returns `true` if `key` was already present and still within its
    /// TTL (this call should be treated as a duplicate); otherwise
    /// records `key` with the current timestamp and returns `false`.
    /// Uses the cache's default TTL — see [`Self::check_and_insert_with_ttl`]
    /// for callers (the Detection Engine) that need a per-entry TTL.
    pub fn check_and_insert(&self, key: &str) -> bool {
        self.check_and_insert_with_ttl(key, self.default_ttl)
    }

    /// Same as [`Self::check_and_insert`], but the throttle window for
    /// this key is `ttl` rather than the cache's default — lets the
    /// Detection Engine throttle each rule by its own configured
    /// `throttle_window_secs` while sharing one cache.
    pub fn check_and_insert_with_ttl(&self, key: &str, ttl: Duration) -> bool {
        let mut cache = self.inner.lock();
        if let Some(entry) = cache.get(key) {
            if entry.inserted_at.elapsed() < entry.ttl {
                return true;
            }
        }
        cache.put(key.to_string(), Entry { inserted_at: Instant::now(), ttl });
        false
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_insert_within_ttl_is_a_duplicate() {
        let cache = TtlLruCache::new(10, Duration::from_secs(60));
        assert!(!cache.check_and_insert("a"));
        assert!(cache.check_and_insert("a"));
    }

    #[test]
    fn entry_expires_after_ttl() {
        let cache = TtlLruCache::new(10, Duration::from_millis(10));
        assert!(!cache.check_and_insert("a"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!cache.check_and_insert("a"));
    }

    #[test]
    fn bounded_capacity_evicts_oldest() {
        let cache = TtlLruCache::new(1, Duration::from_secs(60));
        assert!(!cache.check_and_insert("a"));
        assert!(!cache.check_and_insert("b"));
        assert!(!cache.check_and_insert("a"));
    }
}
