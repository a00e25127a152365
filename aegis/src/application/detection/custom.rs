// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::application::detection::{RuleEvaluator, RuleMatch};
use aegis_domain::entities::{evaluate_field_operator, ConditionGroup, CustomRule, DetectionRule, Event, FieldCondition, FieldOperator, LogicalOp};
use aegis_domain::error::AegisError;
use async_trait::async_trait;
use serde_json::Value;

/// Evaluates hand-authored boolean-condition rules. A field/operator
/// pair that can't be compared because of a type mismatch (e.g.
/// `greater_than` against a string) is a non-match, never an error —
/// matching the "type mismatch never errors" contract for this
/// evaluator specifically.
#[derive(Default)]
pub struct CustomEvaluator;

impl CustomEvaluator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RuleEvaluator for CustomEvaluator {
    fn handles(&self, rule: &DetectionRule) -> bool {
        matches!(rule, DetectionRule::Custom(_))
    }

    async fn evaluate(&self, rule: &DetectionRule, event: &Event) -> Result<RuleMatch, AegisError> {
        let DetectionRule::Custom(CustomRule { condition, .. }) = rule else {
            return Ok(RuleMatch::NoMatch);
        };

        if evaluate_group(condition, event) {
            Ok(RuleMatch::Matched { description: format!("matched condition tree for rule '{}'", rule.id()), matched_fields: matched_field_values(condition, event) })
        } else {
            Ok(RuleMatch::NoMatch)
        }
    }
}

fn evaluate_group(group: &ConditionGroup, event: &Event) -> bool {
    match group.op {
        LogicalOp::And => group.conditions.iter().all(|c| evaluate_condition(c, event)) && group.groups.iter().all(|g| evaluate_group(g, event)),
        LogicalOp::Or => group.conditions.iter().any(|c| evaluate_condition(c, event)) || group.groups.iter().any(|g| evaluate_group(g, event)),
        LogicalOp::Not => {
            if let Some(first) = group.conditions.first() {
                !evaluate_condition(first, event)
            } else if let Some(first) = group.groups.first() {
                !evaluate_group(first, event)
            } else {
                false
            }
        }
    }
}

fn evaluate_condition(condition: &FieldCondition, event: &Event) -> bool {
    let actual = event.get_path(&condition.field);

    if condition.op == FieldOperator::Exists {
        return actual.is_some();
    }
    let Some(actual) = actual else { return false };

    evaluate_field_operator(condition.op, &actual, &condition.value)
}

fn matched_field_values(group: &ConditionGroup, event: &Event) -> Value {
    let mut map = serde_json::Map::new();
    collect_fields(group, event, &mut map);
    Value::Object(map)
}

/// Keys `out` by the condition field's bare leaf name (`"data.src_ip"` ->
/// `"src_ip"`) so raised alerts expose `matched_fields` the way a rule
/// author wrote the condition's subject, not its full resolution path.
fn collect_fields(group: &ConditionGroup, event: &Event, out: &mut serde_json::Map<String, Value>) {
    for condition in &group.conditions {
        if let Some(value) = event.get_path(&condition.field) {
            let leaf = condition.field.rsplit('.').next().unwrap_or(&condition.field);
            out.insert(leaf.to_string(), value);
        }
    }
    for nested in &group.groups {
        collect_fields(nested, event, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain::entities::{NewEvent, RuleMeta, Severity, ThrottleScope};
    use serde_json::{json, Map};

    fn rule(condition: ConditionGroup) -> DetectionRule {
        DetectionRule::Custom(CustomRule {
            meta: RuleMeta {
                id: "r1".into(),
                title: "t".into(),
                description: String::new(),
                severity: Severity::Medium,
                tags: vec![],
                enabled: true,
                throttle_window_secs: 300,
                throttle_scope: ThrottleScope::MatchKey,
            },
            condition,
        })
    }

    fn event_with(data: Map<String, Value>) -> Event {
        Event::accept(NewEvent { source: "firewall".into(), event_type: "deny".into(), timestamp: None, data }).unwrap()
    }

    #[tokio::test]
    async fn equals_condition_matches() {
        let evaluator = CustomEvaluator::new();
        let rule = rule(ConditionGroup { op: LogicalOp::And, conditions: vec![FieldCondition { field: "data.attempts".into(), op: FieldOperator::GreaterThan, value: json!(3) }], groups: vec![] });
        let mut data = Map::new();
        data.insert("attempts".into(), json!(5));
        let event = event_with(data);

        let outcome = evaluator.evaluate(&rule, &event).await.unwrap();
        assert!(matches!(outcome, RuleMatch::Matched { .. }));
    }

    #[tokio::test]
    async fn type_mismatch_is_non_match_not_error() {
        let evaluator = CustomEvaluator::new();
        let rule = rule(ConditionGroup { op: LogicalOp::And, conditions: vec![FieldCondition { field: "data.attempts".into(), op: FieldOperator::GreaterThan, value: json!(3) }], groups: vec![] });
        let mut data = Map::new();
        data.insert("attempts".into(), json!("not-a-number"));
        let event = event_with(data);

        let outcome = evaluator.evaluate(&rule, &event).await.unwrap();
        assert!(matches!(outcome, RuleMatch::NoMatch));
    }

    #[tokio::test]
    async fn not_group_negates_single_child() {
        let evaluator = CustomEvaluator::new();
        let rule = rule(ConditionGroup { op: LogicalOp::Not, conditions: vec![FieldCondition { field: "data.blocked".into(), op: FieldOperator::Equals, value: json!(true) }], groups: vec![] });
        let event = event_with(Map::new());

        let outcome = evaluator.evaluate(&rule, &event).await.unwrap();
        assert!(matches!(outcome, RuleMatch::Matched { .. }), "absent field means equals(true) is false, so not() matches");
    }
}
