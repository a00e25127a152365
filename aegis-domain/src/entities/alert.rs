// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::entities::Severity;
use crate::error::AegisError;
use crate::value_objects::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A detection match raised by the Detection Engine and handed to the
/// Response Engine and Alert Dispatcher.
///
/// Alerts are append-only: nothing in this crate mutates an `Alert` after
/// construction. Throttling (at most one alert per `(rule_id, fingerprint)`
/// per throttle window) is enforced by the caller before `Alert::raise` is
/// invoked, not by this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: Uuid,
    pub rule_id: String,
    pub rule_title: String,
    pub severity: Severity,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub source_event_id: Uuid,
    pub matched_fields: Value,
    pub tags: Vec<String>,
}

impl Alert {
    /// Constructs an alert from a rule match. `rule_id`/`rule_title` must
    /// be non-empty — an alert with no attributable rule is a Detection
    /// Engine bug, not a user-facing validation error, but it is still
    /// rejected here rather than silently accepted.
    #[allow(clippy::too_many_arguments)]
    pub fn raise(
        rule_id: impl Into<String>,
        rule_title: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        source_event_id: Uuid,
        matched_fields: Value,
        tags: Vec<String>,
    ) -> Result<Self, AegisError> {
        let rule_id = rule_id.into();
        let rule_title = rule_title.into();
        if rule_id.trim().is_empty() {
            return Err(AegisError::internal("alert raised with empty rule_id"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            rule_id,
            rule_title,
            severity,
            description: description.into(),
            timestamp: Utc::now(),
            source_event_id,
            matched_fields,
            tags,
        })
    }

    /// The throttle key this alert would have been deduplicated under,
    /// derived from its own matched fields. Exposed so the detection
    /// engine's throttle cache can be keyed consistently whether it is
    /// checking before or recording after raising an alert.
    pub fn throttle_key(&self, fingerprint: Fingerprint) -> String {
        format!("{}:{}", self.rule_id, fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_rejects_blank_rule_id() {
        let result = Alert::raise(" ", "title", Severity::High, "desc", Uuid::new_v4(), Value::Null, vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn raise_succeeds_with_valid_rule_id() {
        let alert = Alert::raise("rule-1", "Repeated failed logins", Severity::High, "5 failed logins in 1m", Uuid::new_v4(), Value::Null, vec!["auth".to_string()]).unwrap();
        assert_eq!(alert.rule_id, "rule-1");
        assert_eq!(alert.severity, Severity::High);
    }
}
