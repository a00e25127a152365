// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use async_trait::async_trait;

/// The outcome of a rate-limit check: either the call is allowed, with
/// the quota left in the current window, or it is rejected with the
/// number of seconds the caller should wait before retrying (`remaining`
/// is implicitly `0` in that case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allow { remaining: u32 },
    Reject { retry_after_secs: u64 },
}

/// A sliding-window rate limiter keyed by an arbitrary string (client IP,
/// username, or a composite). Four quotas are configured independently in
/// practice — `/ingest`, `/ingest/batch`, `/ingest/raw`, and `/token` —
/// each against its own `RateLimiter` instance.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str) -> RateLimitDecision;
}
