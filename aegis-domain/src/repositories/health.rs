// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::error::AegisError;
use async_trait::async_trait;

/// A lightweight liveness probe for an external dependency (message bus,
/// cache). Implemented alongside the adapter's primary port
/// ([`crate::repositories::MessageBus`], [`crate::repositories::RateLimiter`])
/// so `/health` can report per-dependency status without those ports
/// themselves growing a health-specific method.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Name reported in `/health`'s `services` map (`"bus"`, `"cache"`).
    fn component(&self) -> &'static str;

    async fn ping(&self) -> Result<(), AegisError>;
}
