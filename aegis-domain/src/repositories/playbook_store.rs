// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::entities::Playbook;
use crate::error::AegisError;
use async_trait::async_trait;
use std::sync::Arc;

/// Hot-reloadable source of playbooks, mirroring [`crate::repositories::RuleStore`]'s
/// snapshot-and-reload shape.
#[async_trait]
pub trait PlaybookStore: Send + Sync {
    fn snapshot(&self) -> Arc<Vec<Playbook>>;
    async fn reload(&self) -> Result<(), AegisError>;
}
