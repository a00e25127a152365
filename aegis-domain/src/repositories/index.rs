// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::entities::Event;
use crate::value_objects::IndexKey;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index unavailable: {0}")]
    Unavailable(String),
    #[error("index rejected document: {0}")]
    Rejected(String),
}

/// Day offsets, relative to a document's index date, at which an index
/// lifecycle policy transitions a monthly bucket between tiers. `None`
/// means that tier's transition is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecyclePolicy {
    pub warm_after_days: Option<u32>,
    pub cold_after_days: Option<u32>,
    pub delete_after_days: Option<u32>,
}

/// The search/storage surface events are written to and alerts/playbooks
/// query against. Documents are addressed by `(index_key, event.id)` so
/// `put` is idempotent: replaying the same event into the same monthly
/// bucket overwrites rather than duplicates, which is what makes
/// Processor-side retry-after-partial-failure safe.
#[async_trait]
pub trait IndexClient: Send + Sync {
    async fn put(&self, prefix: &str, key: IndexKey, event: &Event) -> Result<(), IndexError>;

    /// Returns up to `limit` events in `index_key` matching a simple
    /// equality filter on `field`, newest first. Sufficient for the
    /// playbook/alert query surfaces without committing to a full query
    /// DSL.
    async fn search(&self, prefix: &str, key: IndexKey, field: &str, value: &serde_json::Value, limit: usize) -> Result<Vec<Event>, IndexError>;

    /// Ensures the index template for `prefix` exists with the given
    /// lifecycle policy and stable field mappings. Called once at
    /// startup and whenever the policy changes; never on the hot path.
    async fn ensure_template(&self, prefix: &str, policy: LifecyclePolicy) -> Result<(), IndexError>;
}
