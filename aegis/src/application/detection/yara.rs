// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::application::detection::{RuleEvaluator, RuleMatch};
use aegis_domain::entities::{DetectionRule, Event, YaraRuleSet};
use aegis_domain::error::AegisError;
use async_trait::async_trait;
use base64::Engine;
use serde_json::json;

/// Scans a configured blob field (e.g. `data.payload_base64`, a
/// base64-encoded file or memory dump captured by the producing agent)
/// against a compiled YARA ruleset. A rule without that field present
/// on the event is a non-match, not an error — most events carry no
/// binary payload at all.
pub struct YaraEvaluator {
    blob_field: String,
}

impl YaraEvaluator {
    pub fn new(blob_field: impl Into<String>) -> Self {
        Self { blob_field: blob_field.into() }
    }

    fn compile(&self, rules_source: &str) -> Result<yara_x::Rules, AegisError> {
        let mut compiler = yara_x::Compiler::new();
        compiler.add_source(rules_source).map_err(|e| AegisError::internal(format!("compiling yara rules: {e}")))?;
        Ok(compiler.build())
    }
}

#[async_trait]
impl RuleEvaluator for YaraEvaluator {
    fn handles(&self, rule: &DetectionRule) -> bool {
        matches!(rule, DetectionRule::Yara(_))
    }

    async fn evaluate(&self, rule: &DetectionRule, event: &Event) -> Result<RuleMatch, AegisError> {
        let DetectionRule::Yara(YaraRuleSet { rules_source, .. }) = rule else {
            return Ok(RuleMatch::NoMatch);
        };

        let Some(blob_value) = event.get_path(&self.blob_field) else { return Ok(RuleMatch::NoMatch) };
        let Some(encoded) = blob_value.as_str() else { return Ok(RuleMatch::NoMatch) };
        let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
            return Ok(RuleMatch::NoMatch);
        };

        let compiled = self.compile(rules_source)?;
        let mut scanner = yara_x::Scanner::new(&compiled);
        let results = scanner.scan(&bytes).map_err(|e| AegisError::internal(format!("yara scan failed: {e}")))?;

        let matched_rules: Vec<String> = results.matching_rules().map(|m| m.identifier().to_string()).collect();
        if matched_rules.is_empty() {
            return Ok(RuleMatch::NoMatch);
        }

        Ok(RuleMatch::Matched {
            description: format!("yara ruleset '{}' matched signatures {:?} on field '{}'", rule.id(), matched_rules, self.blob_field),
            matched_fields: json!({ "field": self.blob_field, "matched_rules": matched_rules }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain::entities::{NewEvent, RuleMeta, Severity, ThrottleScope};
    use serde_json::Map;

    fn rule(rules_source: &str) -> DetectionRule {
        DetectionRule::Yara(YaraRuleSet {
            meta: RuleMeta {
                id: "yara-1".into(),
                title: "t".into(),
                description: String::new(),
                severity: Severity::Critical,
                tags: vec![],
                enabled: true,
                throttle_window_secs: 300,
                throttle_scope: ThrottleScope::MatchKey,
            },
            rules_source: rules_source.to_string(),
        })
    }

    #[tokio::test]
    async fn event_without_blob_field_is_non_match() {
        let evaluator = YaraEvaluator::new("data.payload_base64");
        let r = rule("rule dummy { condition: true }");
        let event = Event::accept(NewEvent { source: "edr".into(), event_type: "file_scan".into(), timestamp: None, data: Map::new() }).unwrap();
        let outcome = evaluator.evaluate(&r, &event).await.unwrap();
        assert!(matches!(outcome, RuleMatch::NoMatch));
    }

    #[tokio::test]
    async fn matching_signature_raises_a_match() {
        let evaluator = YaraEvaluator::new("data.payload_base64");
        let r = rule(r#"rule eicar_like { strings: $a = "EICAR" condition: $a }"#);
        let mut data = Map::new();
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"contains EICAR marker");
        data.insert("payload_base64".into(), serde_json::json!(encoded));
        let event = Event::accept(NewEvent { source: "edr".into(), event_type: "file_scan".into(), timestamp: None, data }).unwrap();

        let outcome = evaluator.evaluate(&r, &event).await.unwrap();
        assert!(matches!(outcome, RuleMatch::Matched { .. }));
    }
}
