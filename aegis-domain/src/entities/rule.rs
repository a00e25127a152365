// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use serde::{Deserialize, Serialize};

/// Alert severity, ordered `Low < Medium < High < Critical` so rule sets
/// and dashboards can sort by urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// How alert throttling groups repeated matches of the same rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleScope {
    /// One alert per `(rule_id, fingerprint)` per throttle window — the
    /// default, matching spec.md's described throttling behavior.
    MatchKey,
    /// One alert per `rule_id` per throttle window, regardless of which
    /// events matched.
    Rule,
}

impl Default for ThrottleScope {
    fn default() -> Self {
        Self::MatchKey
    }
}

fn default_throttle_window_secs() -> u64 {
    300
}

/// Fields shared by every rule variant, matching the common envelope
/// described for rule files on disk (one YAML document per rule, tagged
/// by `type`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMeta {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_throttle_window_secs")]
    pub throttle_window_secs: u64,
    #[serde(default)]
    pub throttle_scope: ThrottleScope,
}

impl RuleMeta {
    pub fn throttle_window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.throttle_window_secs)
    }
}

fn default_enabled() -> bool {
    true
}

/// A comparison operator usable in a [`FieldCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOperator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    GreaterThan,
    #[serde(rename = "gte")]
    GreaterOrEqual,
    LessThan,
    #[serde(rename = "lte")]
    LessOrEqual,
    #[serde(rename = "in")]
    In,
    NotIn,
    Exists,
}

/// Evaluates `op` with `actual` (resolved from the subject document) and
/// `expected` (the condition's configured `value`). Shared by rule
/// conditions ([`FieldCondition`]) and alert/playbook conditions
/// (`ActionCondition`) — both reduce to "compare one resolved JSON value
/// against one configured JSON value."
pub fn evaluate_field_operator(op: FieldOperator, actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
    match op {
        FieldOperator::Exists => true,
        FieldOperator::Equals => actual == expected,
        FieldOperator::NotEquals => actual != expected,
        FieldOperator::Contains => match actual.as_array() {
            Some(items) => items.contains(expected),
            None => match (actual.as_str(), expected.as_str()) {
                (Some(a), Some(b)) => a.contains(b),
                _ => false,
            },
        },
        FieldOperator::StartsWith => match (actual.as_str(), expected.as_str()) {
            (Some(a), Some(b)) => a.starts_with(b),
            _ => false,
        },
        FieldOperator::EndsWith => match (actual.as_str(), expected.as_str()) {
            (Some(a), Some(b)) => a.ends_with(b),
            _ => false,
        },
        FieldOperator::Regex => match (actual.as_str(), expected.as_str()) {
            (Some(a), Some(pattern)) => regex::Regex::new(pattern).map(|re| re.is_match(a)).unwrap_or(false),
            _ => false,
        },
        FieldOperator::GreaterThan => actual.as_f64().zip(expected.as_f64()).map(|(a, b)| a > b).unwrap_or(false),
        FieldOperator::GreaterOrEqual => actual.as_f64().zip(expected.as_f64()).map(|(a, b)| a >= b).unwrap_or(false),
        FieldOperator::LessThan => actual.as_f64().zip(expected.as_f64()).map(|(a, b)| a < b).unwrap_or(false),
        FieldOperator::LessOrEqual => actual.as_f64().zip(expected.as_f64()).map(|(a, b)| a <= b).unwrap_or(false),
        FieldOperator::In => expected.as_array().map(|items| items.contains(actual)).unwrap_or(false),
        FieldOperator::NotIn => !expected.as_array().map(|items| items.contains(actual)).unwrap_or(false),
    }
}

/// `field <op> value`, where `field` is a dotted path resolved against
/// [`crate::entities::Event::get_path`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub op: FieldOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// How sibling conditions/groups within a [`ConditionGroup`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// A boolean tree of field conditions. `Not` groups use only the first
/// child and ignore the rest, matching the common "negate a single
/// subexpression" usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub op: LogicalOp,
    #[serde(default)]
    pub conditions: Vec<FieldCondition>,
    #[serde(default)]
    pub groups: Vec<ConditionGroup>,
}

/// A hand-authored boolean-logic detection rule, the `type: custom`
/// variant of a rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRule {
    #[serde(flatten)]
    pub meta: RuleMeta,
    pub condition: ConditionGroup,
}

/// A rule expressed as Sigma YAML, the `type: sigma` variant. The Sigma
/// `detection:` block is kept as an opaque YAML mapping and compiled by
/// the Sigma evaluator at load time rather than at rule-file parse time,
/// so that a malformed Sigma body fails rule activation instead of
/// failing the whole rule store load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigmaRule {
    #[serde(flatten)]
    pub meta: RuleMeta,
    pub detection: serde_yaml::Value,
    #[serde(default)]
    pub logsource: serde_yaml::Value,
}

/// A set of YARA signatures matched against an event's serialized JSON
/// payload, the `type: yara` variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YaraRuleSet {
    #[serde(flatten)]
    pub meta: RuleMeta,
    pub rules_source: String,
}

/// A statistical baseline-deviation rule, the `type: anomaly` variant.
/// `field` names the numeric or cardinality signal tracked, `window`
/// bounds the rolling baseline, and `threshold_stddev` is how many
/// standard deviations above the rolling mean counts as anomalous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRule {
    #[serde(flatten)]
    pub meta: RuleMeta,
    pub field: String,
    pub window_secs: u64,
    pub threshold_stddev: f64,
    #[serde(default)]
    pub group_by: Vec<String>,
}

/// A loaded, activatable detection rule. Exactly one rule file maps to
/// exactly one `DetectionRule`, tagged by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DetectionRule {
    Custom(CustomRule),
    Sigma(SigmaRule),
    Yara(YaraRuleSet),
    Anomaly(AnomalyRule),
}

impl DetectionRule {
    pub fn meta(&self) -> &RuleMeta {
        match self {
            Self::Custom(r) => &r.meta,
            Self::Sigma(r) => &r.meta,
            Self::Yara(r) => &r.meta,
            Self::Anomaly(r) => &r.meta,
        }
    }

    pub fn id(&self) -> &str {
        &self.meta().id
    }

    pub fn is_enabled(&self) -> bool {
        self.meta().enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_rule_round_trips_through_yaml() {
        let yaml = r#"
type: custom
id: rule-1
title: Repeated failed logins
severity: high
condition:
  op: and
  conditions:
    - field: event_type
      op: equals
      value: "login_failed"
"#;
        let rule: DetectionRule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.id(), "rule-1");
        assert!(rule.is_enabled());
        assert_eq!(rule.meta().severity, Severity::High);
    }

    #[test]
    fn severity_orders_low_to_critical() {
        let mut severities = vec![Severity::Critical, Severity::Low, Severity::High, Severity::Medium];
        severities.sort();
        assert_eq!(severities, vec![Severity::Low, Severity::Medium, Severity::High, Severity::Critical]);
    }
}
