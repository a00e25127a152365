// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A comparison evaluated against the triggering [`crate::entities::Alert`]
/// (e.g. `severity >= high`), used both to gate a [`Playbook`]'s own
/// activation (`triggers`) and an individual [`PlaybookAction`]'s
/// execution (`conditions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCondition {
    pub field: String,
    pub op: crate::entities::FieldOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl ActionCondition {
    /// Evaluates this condition against `alert`'s JSON representation.
    /// `field` is a dot-separated path resolved from the alert's root.
    pub fn holds(&self, alert: &crate::entities::Alert) -> bool {
        let Ok(alert_json) = serde_json::to_value(alert) else { return false };
        let Some(actual) = resolve_path(&alert_json, &self.field) else {
            return false;
        };
        crate::entities::evaluate_field_operator(self.op, actual, &self.value)
    }
}

fn resolve_path<'a>(root: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// One step of a playbook: drive an external system (`action_type` names
/// the driver, e.g. `"thehive"`, `"cortex"`, `"ansible"`, `"python"`,
/// `"webhook"`) with `parameters`, only if every condition in
/// `conditions` holds against the triggering alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookAction {
    pub name: String,
    pub action_type: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub conditions: Vec<ActionCondition>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// If `true`, a failed or timed-out execution of this action stops
    /// the rest of the playbook run; otherwise the run continues with
    /// the next action regardless of this one's outcome.
    #[serde(default)]
    pub fail_stop: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

/// An ordered set of actions triggered when a matching alert is raised.
/// `triggers` is a list of field conditions evaluated against the raised
/// [`crate::entities::Alert`] and combined with AND — an empty list
/// always holds, so a playbook with no triggers fires for every alert.
/// Actions execute strictly in declaration order — a later action never
/// starts before an earlier one in the same run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playbook {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub triggers: Vec<ActionCondition>,
    pub actions: Vec<PlaybookAction>,
}

fn default_enabled() -> bool {
    true
}

impl Playbook {
    pub fn triggered_by(&self, alert: &crate::entities::Alert) -> bool {
        self.enabled && self.triggers.iter().all(|condition| condition.holds(alert))
    }
}

/// How one action's execution within a playbook run concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Skipped,
    Error,
    Timeout,
}

/// An append-only log row for one action's execution within one
/// playbook run, persisted for audit and for the run history API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookRunRecord {
    pub id: Uuid,
    pub playbook_id: String,
    pub alert_id: Uuid,
    pub action_name: String,
    pub status: RunStatus,
    pub duration_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl PlaybookRunRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(playbook_id: impl Into<String>, alert_id: Uuid, action_name: impl Into<String>, status: RunStatus, duration_ms: u64, error: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            playbook_id: playbook_id.into(),
            alert_id,
            action_name: action_name.into(),
            status,
            duration_ms,
            error,
            finished_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{FieldOperator, Severity};
    use uuid::Uuid;

    fn sample_alert() -> crate::entities::Alert {
        crate::entities::Alert::raise("rule-1", "Repeated failed logins", Severity::High, "desc", Uuid::new_v4(), serde_json::json!({ "tags": ["security"] }), vec!["security".into()]).unwrap()
    }

    fn sample_playbook() -> Playbook {
        Playbook {
            id: "pb-1".into(),
            name: "Contain brute force".into(),
            enabled: true,
            triggers: vec![ActionCondition { field: "severity".into(), op: FieldOperator::Equals, value: serde_json::json!("high") }],
            actions: vec![],
        }
    }

    #[test]
    fn triggered_by_matches_a_single_condition() {
        let playbook = sample_playbook();
        assert!(playbook.triggered_by(&sample_alert()));
    }

    #[test]
    fn triggered_by_requires_every_condition_to_hold() {
        let mut playbook = sample_playbook();
        playbook.triggers.push(ActionCondition { field: "tags".into(), op: FieldOperator::Contains, value: serde_json::json!("network") });
        assert!(!playbook.triggered_by(&sample_alert()), "second condition does not hold against the sample alert's tags");
    }

    #[test]
    fn empty_triggers_always_hold() {
        let mut playbook = sample_playbook();
        playbook.triggers = vec![];
        assert!(playbook.triggered_by(&sample_alert()));
    }

    #[test]
    fn disabled_playbook_never_triggers() {
        let mut playbook = sample_playbook();
        playbook.enabled = false;
        assert!(!playbook.triggered_by(&sample_alert()));
    }
}
