// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The Detection Engine: evaluates every enabled rule against each
//! enriched event, throttles repeated matches, and raises [`Alert`]s.
//!
//! [`RuleEvaluator`] is an application-layer trait, not a domain port —
//! unlike [`aegis_domain::services::enrich::Enricher`], the four
//! evaluator kinds are fixed by rule `type`, not swapped in by
//! deployment configuration.

pub mod anomaly;
pub mod custom;
pub mod sigma;
pub mod yara;

use crate::infrastructure::dedup::TtlLruCache;
use aegis_domain::entities::{Alert, DetectionRule, Event};
use aegis_domain::error::AegisError;
use aegis_domain::repositories::{BusRecord, Consumer, MessageBus, RuleStore};
use aegis_domain::Fingerprint;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// The result of evaluating one rule against one event.
pub enum RuleMatch {
    Matched { description: String, matched_fields: Value },
    NoMatch,
}

/// One rule-type's evaluation logic. `handles` lets the engine route
/// each rule to exactly one evaluator without a central type-switch.
#[async_trait]
pub trait RuleEvaluator: Send + Sync {
    fn handles(&self, rule: &DetectionRule) -> bool;

    /// Evaluates `rule` against `event`. Errors are isolated by the
    /// caller — a failing evaluator never aborts evaluation of the
    /// remaining rules for this event.
    async fn evaluate(&self, rule: &DetectionRule, event: &Event) -> Result<RuleMatch, AegisError>;
}

/// Consumes `enriched_logs`, evaluates every enabled rule via the
/// evaluator registered for its type, throttles repeated matches per
/// `(rule_id, fingerprint-or-rule)` within the rule's configured
/// window, and publishes raised alerts onto `alerts`.
pub struct DetectionEngine {
    bus: Arc<dyn MessageBus>,
    consumer: Arc<dyn Consumer>,
    rule_store: Arc<dyn RuleStore>,
    evaluators: Vec<Arc<dyn RuleEvaluator>>,
    throttle: TtlLruCache,
    alerts_topic: String,
    ack_timeout: Duration,
}

impl DetectionEngine {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        consumer: Arc<dyn Consumer>,
        rule_store: Arc<dyn RuleStore>,
        evaluators: Vec<Arc<dyn RuleEvaluator>>,
        throttle: TtlLruCache,
        alerts_topic: impl Into<String>,
        ack_timeout: Duration,
    ) -> Self {
        Self { bus, consumer, rule_store, evaluators, throttle, alerts_topic: alerts_topic.into(), ack_timeout }
    }

    /// Polls one enriched event and evaluates every enabled rule
    /// against it. Returns `false` when the poll timed out idle.
    pub async fn run_once(&self, poll_timeout: Duration) -> Result<bool, AegisError> {
        let Some(record) = self.consumer.poll(poll_timeout).await.map_err(|e| AegisError::upstream_unavailable(e.to_string()))? else {
            return Ok(false);
        };
        self.process(record).await?;
        Ok(true)
    }

    async fn process(&self, record: BusRecord) -> Result<(), AegisError> {
        let event: Event = serde_json::from_slice(&record.value)?;
        let snapshot = self.rule_store.snapshot();

        for rule in snapshot.enabled_rules() {
            let Some(evaluator) = self.evaluators.iter().find(|e| e.handles(rule)) else {
                warn!(rule_id = rule.id(), "no evaluator registered for this rule type, skipping");
                continue;
            };

            let outcome = evaluator.evaluate(rule, &event).await;
            let matched = match outcome {
                Ok(RuleMatch::Matched { description, matched_fields }) => (description, matched_fields),
                Ok(RuleMatch::NoMatch) => continue,
                Err(err) => {
                    error!(rule_id = rule.id(), error = %err, "rule evaluation failed, continuing with remaining rules");
                    continue;
                }
            };

            if self.is_throttled(rule, &event) {
                continue;
            }

            let (description, matched_fields) = matched;
            let alert = Alert::raise(rule.id(), &rule.meta().title, rule.meta().severity, description, event.id, matched_fields, rule.meta().tags.clone())?;

            let value = serde_json::to_vec(&alert)?;
            self.bus.publish(&self.alerts_topic, &alert.rule_id, value, self.ack_timeout).await.map_err(|e| AegisError::upstream_unavailable(e.to_string()))?;
        }

        self.consumer.commit(&record).await.map_err(|e| AegisError::upstream_unavailable(e.to_string()))?;
        Ok(())
    }

    fn is_throttled(&self, rule: &DetectionRule, event: &Event) -> bool {
        let key = match rule.meta().throttle_scope {
            aegis_domain::entities::ThrottleScope::Rule => rule.id().to_string(),
            aegis_domain::entities::ThrottleScope::MatchKey => {
                let fingerprint = Fingerprint::compute(&event.source, &event.event_type, &event.data);
                format!("{}:{fingerprint}", rule.id())
            }
        };
        self.throttle.check_and_insert_with_ttl(&key, rule.meta().throttle_window())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bus::InMemoryBus;
    use aegis_domain::entities::{ConditionGroup, CustomRule, FieldCondition, FieldOperator, LogicalOp, NewEvent, RuleMeta, Severity, ThrottleScope};
    use aegis_domain::repositories::RuleSnapshot;
    use serde_json::Map;

    struct FixedRuleStore {
        snapshot: Arc<RuleSnapshot>,
    }

    #[async_trait]
    impl RuleStore for FixedRuleStore {
        fn snapshot(&self) -> Arc<RuleSnapshot> {
            self.snapshot.clone()
        }

        async fn reload(&self) -> Result<(), AegisError> {
            Ok(())
        }
    }

    fn failed_login_rule() -> DetectionRule {
        DetectionRule::Custom(CustomRule {
            meta: RuleMeta {
                id: "failed-login".into(),
                title: "Failed login".into(),
                description: String::new(),
                severity: Severity::High,
                tags: vec![],
                enabled: true,
                throttle_window_secs: 300,
                throttle_scope: ThrottleScope::MatchKey,
            },
            condition: ConditionGroup {
                op: LogicalOp::And,
                conditions: vec![FieldCondition { field: "event_type".into(), op: FieldOperator::Equals, value: serde_json::json!("login_failed") }],
                groups: vec![],
            },
        })
    }

    #[tokio::test]
    async fn matching_event_raises_one_alert_and_throttles_the_second() {
        let bus = Arc::new(InMemoryBus::new());
        let consumer: Arc<dyn Consumer> = Arc::new(bus.consumer("enriched_logs").unwrap());
        let alerts: Arc<dyn Consumer> = Arc::new(bus.consumer("alerts").unwrap());
        let rule_store: Arc<dyn RuleStore> = Arc::new(FixedRuleStore { snapshot: Arc::new(RuleSnapshot::new(vec![failed_login_rule()])) });
        let evaluators: Vec<Arc<dyn RuleEvaluator>> = vec![Arc::new(custom::CustomEvaluator::new())];
        let engine = DetectionEngine::new(bus.clone(), consumer, rule_store, evaluators, TtlLruCache::new(1000, Duration::from_secs(300)), "alerts", Duration::from_secs(1));

        let event = Event::accept(NewEvent { source: "vpn".into(), event_type: "login_failed".into(), timestamp: None, data: Map::new() }).unwrap();
        bus.publish("enriched_logs", "vpn", serde_json::to_vec(&event).unwrap(), Duration::from_secs(1)).await.unwrap();
        bus.publish("enriched_logs", "vpn", serde_json::to_vec(&event).unwrap(), Duration::from_secs(1)).await.unwrap();

        assert!(engine.run_once(Duration::from_secs(1)).await.unwrap());
        assert!(engine.run_once(Duration::from_secs(1)).await.unwrap());

        let first = alerts.poll(Duration::from_millis(200)).await.unwrap();
        assert!(first.is_some());
        let second = alerts.poll(Duration::from_millis(200)).await.unwrap();
        assert!(second.is_none(), "second identical match must be throttled within the window");
    }
}
