// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Renders a playbook action's `parameters` bag against the triggering
//! alert. Intentionally not a general templating engine — just
//! `{{ alert.field.path }}` substitution inside string values, matching
//! the restricted, validated parameter-bag pattern used elsewhere for
//! passing untrusted-shaped config into an adapter call.

use aegis_domain::entities::Alert;
use serde_json::{Map, Value};

/// Walks `parameters`, replacing every `{{ alert.<path> }}` placeholder
/// found inside string values with the alert field it names (stringified
/// if the resolved value isn't itself a string). A placeholder whose
/// path doesn't resolve is left in the output untouched, so a
/// misconfigured action fails loudly downstream rather than silently
/// dropping text.
pub fn render(parameters: &Map<String, Value>, alert: &Alert) -> Map<String, Value> {
    parameters.iter().map(|(key, value)| (key.clone(), render_value(value, alert))).collect()
}

fn render_value(value: &Value, alert: &Alert) -> Value {
    match value {
        Value::String(s) => Value::String(render_string(s, alert)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, alert)).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), render_value(v, alert))).collect()),
        other => other.clone(),
    }
}

fn render_string(template: &str, alert: &Alert) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let expr = after_open[..end].trim();
        out.push_str(&resolve(expr, alert).unwrap_or_else(|| format!("{{{{{expr}}}}}")));
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    out
}

fn resolve(expr: &str, alert: &Alert) -> Option<String> {
    let path = expr.strip_prefix("alert.")?;
    let alert_json = serde_json::to_value(alert).ok()?;
    let mut current = &alert_json;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(match current {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain::entities::Severity;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_alert() -> Alert {
        Alert::raise("rule-1", "Failed logins", Severity::High, "5 failures in 1m", Uuid::new_v4(), json!({ "src_ip": "10.0.0.7" }), vec!["auth".into()]).unwrap()
    }

    #[test]
    fn substitutes_known_field() {
        let alert = sample_alert();
        let mut params = Map::new();
        params.insert("message".into(), json!("Rule {{ alert.rule_id }} fired"));
        let rendered = render(&params, &alert);
        assert_eq!(rendered["message"], json!("Rule rule-1 fired"));
    }

    #[test]
    fn unresolvable_path_is_left_untouched() {
        let alert = sample_alert();
        let mut params = Map::new();
        params.insert("message".into(), json!("{{ alert.nonexistent_field }}"));
        let rendered = render(&params, &alert);
        assert_eq!(rendered["message"], json!("{{ alert.nonexistent_field }}"));
    }

    #[test]
    fn nested_path_resolves_through_matched_fields() {
        let alert = sample_alert();
        let mut params = Map::new();
        params.insert("ip".into(), json!("{{ alert.matched_fields.src_ip }}"));
        let rendered = render(&params, &alert);
        assert_eq!(rendered["ip"], json!("10.0.0.7"));
    }
}
