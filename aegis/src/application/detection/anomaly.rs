// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::application::detection::{RuleEvaluator, RuleMatch};
use aegis_domain::entities::{AnomalyRule, DetectionRule, Event};
use aegis_domain::error::AegisError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// A per-rule baseline fitted offline by the `detector train` CLI
/// subcommand from historical index data: the rolling mean and
/// standard deviation of `rule.field`'s numeric value, optionally
/// grouped by `rule.group_by`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyModel {
    pub mean: f64,
    pub stddev: f64,
    pub sample_count: u64,
}

/// Standardized-score anomaly detection: loads one `{rule_id}.json`
/// model artifact per rule from a directory and flags events whose
/// `field` value deviates from the fitted baseline by more than
/// `threshold_stddev` standard deviations. A rule with no model on
/// disk yet, or a zero-variance baseline, never matches — there's
/// nothing to compare against.
pub struct AnomalyEvaluator {
    models: HashMap<String, AnomalyModel>,
}

impl AnomalyEvaluator {
    pub async fn load(models_dir: impl AsRef<Path>) -> Result<Self, AegisError> {
        let models_dir = models_dir.as_ref();
        let mut models = HashMap::new();

        let mut entries = match fs::read_dir(models_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self { models }),
            Err(e) => return Err(AegisError::from(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let rule_id = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
            let contents = fs::read_to_string(&path).await?;
            let model: AnomalyModel = serde_json::from_str(&contents)?;
            models.insert(rule_id, model);
        }

        Ok(Self { models })
    }

    pub fn with_models(models: HashMap<String, AnomalyModel>) -> Self {
        Self { models }
    }

    /// Writes a fitted model for `rule_id`, used by the offline
    /// training subcommand.
    pub async fn persist_model(models_dir: impl AsRef<Path>, rule_id: &str, model: &AnomalyModel) -> Result<(), AegisError> {
        let models_dir = models_dir.as_ref();
        fs::create_dir_all(models_dir).await?;
        let path: PathBuf = models_dir.join(format!("{rule_id}.json"));
        fs::write(path, serde_json::to_vec_pretty(model)?).await?;
        Ok(())
    }
}

#[async_trait]
impl RuleEvaluator for AnomalyEvaluator {
    fn handles(&self, rule: &DetectionRule) -> bool {
        matches!(rule, DetectionRule::Anomaly(_))
    }

    async fn evaluate(&self, rule: &DetectionRule, event: &Event) -> Result<RuleMatch, AegisError> {
        let DetectionRule::Anomaly(AnomalyRule { field, threshold_stddev, .. }) = rule else {
            return Ok(RuleMatch::NoMatch);
        };

        let Some(model) = self.models.get(rule.id()) else { return Ok(RuleMatch::NoMatch) };
        if model.stddev <= 0.0 {
            return Ok(RuleMatch::NoMatch);
        }

        let Some(value) = event.get_path(field).and_then(|v| v.as_f64()) else { return Ok(RuleMatch::NoMatch) };
        let z_score = (value - model.mean) / model.stddev;

        if z_score.abs() <= *threshold_stddev {
            return Ok(RuleMatch::NoMatch);
        }

        Ok(RuleMatch::Matched {
            description: format!("field '{field}' is {z_score:.2} standard deviations from the fitted baseline (threshold {threshold_stddev})"),
            matched_fields: json!({ "field": field, "value": value, "z_score": z_score, "mean": model.mean, "stddev": model.stddev }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain::entities::{NewEvent, RuleMeta, Severity, ThrottleScope};
    use serde_json::{json as j, Map};
    use tempfile::tempdir;

    fn rule(field: &str, threshold: f64) -> DetectionRule {
        DetectionRule::Anomaly(AnomalyRule {
            meta: RuleMeta {
                id: "bytes-out-spike".into(),
                title: "t".into(),
                description: String::new(),
                severity: Severity::Medium,
                tags: vec![],
                enabled: true,
                throttle_window_secs: 300,
                throttle_scope: ThrottleScope::MatchKey,
            },
            field: field.to_string(),
            window_secs: 3600,
            threshold_stddev: threshold,
            group_by: vec![],
        })
    }

    fn event_with_bytes(bytes_out: f64) -> Event {
        let mut data = Map::new();
        data.insert("bytes_out".into(), j!(bytes_out));
        Event::accept(NewEvent { source: "proxy".into(), event_type: "transfer".into(), timestamp: None, data }).unwrap()
    }

    #[tokio::test]
    async fn value_within_threshold_is_non_match() {
        let mut models = HashMap::new();
        models.insert("bytes-out-spike".to_string(), AnomalyModel { mean: 1000.0, stddev: 200.0, sample_count: 500 });
        let evaluator = AnomalyEvaluator::with_models(models);

        let rule = rule("data.bytes_out", 3.0);
        let event = event_with_bytes(1100.0);
        assert!(matches!(evaluator.evaluate(&rule, &event).await.unwrap(), RuleMatch::NoMatch));
    }

    #[tokio::test]
    async fn large_deviation_matches() {
        let mut models = HashMap::new();
        models.insert("bytes-out-spike".to_string(), AnomalyModel { mean: 1000.0, stddev: 200.0, sample_count: 500 });
        let evaluator = AnomalyEvaluator::with_models(models);

        let rule = rule("data.bytes_out", 3.0);
        let event = event_with_bytes(50_000.0);
        assert!(matches!(evaluator.evaluate(&rule, &event).await.unwrap(), RuleMatch::Matched { .. }));
    }

    #[tokio::test]
    async fn missing_model_is_non_match() {
        let evaluator = AnomalyEvaluator::with_models(HashMap::new());
        let rule = rule("data.bytes_out", 3.0);
        let event = event_with_bytes(50_000.0);
        assert!(matches!(evaluator.evaluate(&rule, &event).await.unwrap(), RuleMatch::NoMatch));
    }

    #[tokio::test]
    async fn load_reads_models_from_directory() {
        let dir = tempdir().unwrap();
        AnomalyEvaluator::persist_model(dir.path(), "bytes-out-spike", &AnomalyModel { mean: 500.0, stddev: 50.0, sample_count: 10 }).await.unwrap();

        let evaluator = AnomalyEvaluator::load(dir.path()).await.unwrap();
        let rule = rule("data.bytes_out", 2.0);
        let event = event_with_bytes(700.0);
        assert!(matches!(evaluator.evaluate(&rule, &event).await.unwrap(), RuleMatch::Matched { .. }));
    }

    #[tokio::test]
    async fn load_tolerates_missing_directory() {
        let evaluator = AnomalyEvaluator::load("/nonexistent/models/dir").await.unwrap();
        assert!(evaluator.models.is_empty());
    }
}
