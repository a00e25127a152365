// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::error::AegisError;
use async_trait::async_trait;

/// Tracks failed login attempts per username in the shared cache so the
/// login endpoint can lock an account out after too many failures within
/// a window, independent of the per-IP `/token` rate limit.
#[async_trait]
pub trait LoginAttemptTracker: Send + Sync {
    /// The current failure count for `username`, `0` if there is none or
    /// it has expired. Checked before attempting password verification
    /// so a locked-out account is rejected without a verify attempt.
    async fn failure_count(&self, username: &str) -> Result<u32, AegisError>;

    /// Records a failed attempt for `username` and returns the count
    /// within the current window (establishing a fresh window, with
    /// `ttl_seconds` expiry, on the first failure).
    async fn record_failure(&self, username: &str, ttl_seconds: u64) -> Result<u32, AegisError>;

    /// Clears `username`'s failure count, called on a successful login.
    async fn clear(&self, username: &str) -> Result<(), AegisError>;
}
