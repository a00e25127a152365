// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::application::detection::{RuleEvaluator, RuleMatch};
use aegis_domain::entities::{DetectionRule, Event, SigmaRule};
use aegis_domain::error::AegisError;
use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// A single `field|modifier: value` or `field|modifier: [values]` entry
/// within a Sigma selection. Values within one field are OR'd; fields
/// within one selection map are AND'd, matching Sigma's documented
/// selection semantics.
struct FieldMatch {
    field: String,
    modifier: Modifier,
    values: Vec<String>,
}

#[derive(Clone, Copy)]
enum Modifier {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    Base64,
}

impl Modifier {
    fn parse(suffix: Option<&str>) -> Self {
        match suffix {
            Some("contains") => Self::Contains,
            Some("startswith") => Self::StartsWith,
            Some("endswith") => Self::EndsWith,
            Some("re") => Self::Regex,
            Some("base64") => Self::Base64,
            _ => Self::Equals,
        }
    }
}

struct Selection {
    name: String,
    fields: Vec<FieldMatch>,
}

impl Selection {
    fn matches(&self, event: &Event) -> bool {
        self.fields.iter().all(|field_match| {
            let Some(actual) = event.get_path(&field_match.field) else { return false };
            let Some(actual) = actual.as_str() else { return false };
            field_match.values.iter().any(|candidate| match field_match.modifier {
                Modifier::Equals => actual == candidate,
                Modifier::Contains => actual.contains(candidate.as_str()),
                Modifier::StartsWith => actual.starts_with(candidate.as_str()),
                Modifier::EndsWith => actual.ends_with(candidate.as_str()),
                Modifier::Regex => Regex::new(candidate).map(|re| re.is_match(actual)).unwrap_or(false),
                Modifier::Base64 => base64::engine::general_purpose::STANDARD.decode(actual).map(|decoded| decoded == candidate.as_bytes()).unwrap_or(false),
            })
        })
    }
}

/// Compiled once at rule load (not per-event): the named selections plus
/// the boolean expression combining them.
struct CompiledSigma {
    selections: Vec<Selection>,
    condition: CondExpr,
}

enum CondExpr {
    Name(String),
    Not(Box<CondExpr>),
    And(Box<CondExpr>, Box<CondExpr>),
    Or(Box<CondExpr>, Box<CondExpr>),
}

impl CondExpr {
    fn eval(&self, results: &HashMap<String, bool>) -> bool {
        match self {
            Self::Name(name) => *results.get(name).unwrap_or(&false),
            Self::Not(inner) => !inner.eval(results),
            Self::And(a, b) => a.eval(results) && b.eval(results),
            Self::Or(a, b) => a.eval(results) || b.eval(results),
        }
    }
}

/// Parses Sigma's `detection:` block: every key but `condition` is a
/// named selection mapping field names (optionally suffixed
/// `|modifier`) to one value or a list of values; `condition` is a
/// space-separated boolean expression over selection names.
fn compile(detection: &serde_yaml::Value) -> Result<CompiledSigma, AegisError> {
    let mapping = detection.as_mapping().ok_or_else(|| AegisError::internal("sigma detection block must be a mapping"))?;
    let mut selections = Vec::new();
    let mut condition_source = None;

    for (key, value) in mapping {
        let key = key.as_str().ok_or_else(|| AegisError::internal("sigma selection name must be a string"))?;
        if key == "condition" {
            condition_source = value.as_str().map(str::to_string);
            continue;
        }
        selections.push(parse_selection(key, value)?);
    }

    let condition_source = condition_source.ok_or_else(|| AegisError::internal("sigma rule missing condition"))?;
    let condition = parse_condition(&condition_source)?;
    Ok(CompiledSigma { selections, condition })
}

fn parse_selection(name: &str, value: &serde_yaml::Value) -> Result<Selection, AegisError> {
    let mapping = value.as_mapping().ok_or_else(|| AegisError::internal(format!("sigma selection '{name}' must be a mapping")))?;
    let mut fields = Vec::new();
    for (key, value) in mapping {
        let key = key.as_str().ok_or_else(|| AegisError::internal("sigma field key must be a string"))?;
        let mut parts = key.splitn(2, '|');
        let field = parts.next().unwrap_or(key).to_string();
        let modifier = Modifier::parse(parts.next());
        let values = match value {
            serde_yaml::Value::Sequence(items) => items.iter().filter_map(|v| yaml_scalar_to_string(v)).collect(),
            other => yaml_scalar_to_string(other).into_iter().collect(),
        };
        fields.push(FieldMatch { field, modifier, values });
    }
    Ok(Selection { name: name.to_string(), fields })
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A small recursive-descent parser for `not`/`and`/`or` over selection
/// names, enough for the common Sigma condition shapes used by the
/// rules Aegis ships with. Parenthesized grouping is supported;
/// `1 of` / `all of` aggregate selectors are not.
fn parse_condition(source: &str) -> Result<CondExpr, AegisError> {
    let tokens: Vec<String> = source.replace('(', " ( ").replace(')', " ) ").split_whitespace().map(str::to_string).collect();
    let mut pos = 0;
    let expr = parse_or(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(AegisError::internal(format!("unexpected trailing tokens in sigma condition '{source}'")));
    }
    Ok(expr)
}

fn parse_or(tokens: &[String], pos: &mut usize) -> Result<CondExpr, AegisError> {
    let mut lhs = parse_and(tokens, pos)?;
    while tokens.get(*pos).map(String::as_str) == Some("or") {
        *pos += 1;
        let rhs = parse_and(tokens, pos)?;
        lhs = CondExpr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_and(tokens: &[String], pos: &mut usize) -> Result<CondExpr, AegisError> {
    let mut lhs = parse_not(tokens, pos)?;
    while tokens.get(*pos).map(String::as_str) == Some("and") {
        *pos += 1;
        let rhs = parse_not(tokens, pos)?;
        lhs = CondExpr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_not(tokens: &[String], pos: &mut usize) -> Result<CondExpr, AegisError> {
    if tokens.get(*pos).map(String::as_str) == Some("not") {
        *pos += 1;
        return Ok(CondExpr::Not(Box::new(parse_not(tokens, pos)?)));
    }
    parse_atom(tokens, pos)
}

fn parse_atom(tokens: &[String], pos: &mut usize) -> Result<CondExpr, AegisError> {
    match tokens.get(*pos).map(String::as_str) {
        Some("(") => {
            *pos += 1;
            let inner = parse_or(tokens, pos)?;
            if tokens.get(*pos).map(String::as_str) != Some(")") {
                return Err(AegisError::internal("unbalanced parentheses in sigma condition"));
            }
            *pos += 1;
            Ok(inner)
        }
        Some(name) => {
            *pos += 1;
            Ok(CondExpr::Name(name.to_string()))
        }
        None => Err(AegisError::internal("unexpected end of sigma condition")),
    }
}

/// Matches events against Sigma-format rules. Each rule is compiled
/// into selections + condition once per evaluation — Sigma rules are
/// small enough in practice that this is simpler than caching compiled
/// forms keyed by rule id, at the cost of repeated parsing per event.
#[derive(Default)]
pub struct SigmaEvaluator;

impl SigmaEvaluator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RuleEvaluator for SigmaEvaluator {
    fn handles(&self, rule: &DetectionRule) -> bool {
        matches!(rule, DetectionRule::Sigma(_))
    }

    async fn evaluate(&self, rule: &DetectionRule, event: &Event) -> Result<RuleMatch, AegisError> {
        let DetectionRule::Sigma(SigmaRule { detection, .. }) = rule else {
            return Ok(RuleMatch::NoMatch);
        };
        let compiled = compile(detection)?;

        let results: HashMap<String, bool> = compiled.selections.iter().map(|selection| (selection.name.clone(), selection.matches(event))).collect();
        if !compiled.condition.eval(&results) {
            return Ok(RuleMatch::NoMatch);
        }

        let matched_selections: Vec<&str> = results.iter().filter(|(_, matched)| **matched).map(|(name, _)| name.as_str()).collect();
        Ok(RuleMatch::Matched {
            description: format!("sigma rule '{}' matched selections {:?}", rule.id(), matched_selections),
            matched_fields: Value::String(matched_selections.join(",")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain::entities::{NewEvent, RuleMeta, Severity, ThrottleScope};
    use serde_json::{json, Map};

    fn sigma_rule(detection_yaml: &str) -> DetectionRule {
        DetectionRule::Sigma(SigmaRule {
            meta: RuleMeta {
                id: "sigma-1".into(),
                title: "t".into(),
                description: String::new(),
                severity: Severity::High,
                tags: vec![],
                enabled: true,
                throttle_window_secs: 300,
                throttle_scope: ThrottleScope::MatchKey,
            },
            detection: serde_yaml::from_str(detection_yaml).unwrap(),
            logsource: serde_yaml::Value::Null,
        })
    }

    fn event_with_command(command: &str) -> Event {
        let mut data = Map::new();
        data.insert("command_line".into(), json!(command));
        Event::accept(NewEvent { source: "edr".into(), event_type: "process_start".into(), timestamp: None, data }).unwrap()
    }

    #[tokio::test]
    async fn contains_modifier_matches_substring() {
        let detection = "selection:\n  command_line|contains: 'whoami'\ncondition: selection\n";
        let rule = sigma_rule(detection);
        let event = event_with_command("cmd.exe /c whoami /all");
        let outcome = SigmaEvaluator::new().evaluate(&rule, &event).await.unwrap();
        assert!(matches!(outcome, RuleMatch::Matched { .. }));
    }

    #[tokio::test]
    async fn and_of_two_selections_requires_both() {
        let detection = "sel_a:\n  command_line|contains: 'net'\nsel_b:\n  command_line|contains: 'user'\ncondition: sel_a and sel_b\n";
        let rule = sigma_rule(detection);
        let matching = event_with_command("net user administrator /active:yes");
        let non_matching = event_with_command("net view");

        assert!(matches!(SigmaEvaluator::new().evaluate(&rule, &matching).await.unwrap(), RuleMatch::Matched { .. }));
        assert!(matches!(SigmaEvaluator::new().evaluate(&rule, &non_matching).await.unwrap(), RuleMatch::NoMatch));
    }

    #[tokio::test]
    async fn not_negates_selection() {
        let detection = "selection:\n  command_line|contains: 'whoami'\ncondition: not selection\n";
        let rule = sigma_rule(detection);
        let event = event_with_command("ipconfig /all");
        assert!(matches!(SigmaEvaluator::new().evaluate(&rule, &event).await.unwrap(), RuleMatch::Matched { .. }));
    }
}
