// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::entities::DetectionRule;
use crate::error::AegisError;
use async_trait::async_trait;
use std::sync::Arc;

/// An immutable point-in-time view of the active rule set, handed to the
/// Detection Engine's evaluation loop by `Arc` clone so a concurrent
/// reload never mutates rules a running evaluation is holding.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    rules: Vec<Arc<DetectionRule>>,
}

impl RuleSnapshot {
    pub fn new(rules: Vec<DetectionRule>) -> Self {
        Self { rules: rules.into_iter().map(Arc::new).collect() }
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = &Arc<DetectionRule>> {
        self.rules.iter().filter(|r| r.is_enabled())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// A hot-reloadable source of detection rules, backed in production by a
/// directory of rule files watched for changes and, in tests, by a
/// fixed in-memory snapshot.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// The currently active snapshot. Cheap: an `Arc` clone, not a copy.
    fn snapshot(&self) -> Arc<RuleSnapshot>;

    /// Reloads rules from the backing source and, if they parse
    /// successfully, atomically replaces the active snapshot. A failed
    /// reload leaves the previous snapshot active and returns the error.
    async fn reload(&self) -> Result<(), AegisError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ConditionGroup, CustomRule, LogicalOp, RuleMeta, Severity};

    fn rule(id: &str, enabled: bool) -> DetectionRule {
        DetectionRule::Custom(CustomRule {
            meta: RuleMeta {
                id: id.to_string(),
                title: "t".into(),
                description: String::new(),
                severity: Severity::Low,
                tags: vec![],
                enabled,
                throttle_window_secs: 300,
                throttle_scope: Default::default(),
            },
            condition: ConditionGroup { op: LogicalOp::And, conditions: vec![], groups: vec![] },
        })
    }

    #[test]
    fn enabled_rules_excludes_disabled() {
        let snapshot = RuleSnapshot::new(vec![rule("a", true), rule("b", false)]);
        let ids: Vec<&str> = snapshot.enabled_rules().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["a"]);
    }
}
