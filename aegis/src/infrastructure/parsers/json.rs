// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::NewEvent;
use aegis_domain::services::parser::{LogFormat, LogParser};
use chrono::{DateTime, Utc};

/// A bare JSON object, one per line. `event_type` is read from the
/// object's own `event_type` field if present, defaulting to `"json"`;
/// `timestamp`, if present and parseable as RFC 3339, is used, otherwise
/// the caller's wall clock is used.
pub struct JsonParser;

impl LogParser for JsonParser {
    fn format(&self) -> LogFormat {
        LogFormat::Json
    }

    fn try_parse(&self, source: &str, line: &str, _now: DateTime<Utc>) -> Option<NewEvent> {
        let mut value: serde_json::Value = serde_json::from_str(line.trim()).ok()?;
        let object = value.as_object_mut()?;

        let event_type = object.remove("event_type").and_then(|v| v.as_str().map(str::to_string)).unwrap_or_else(|| "json".to_string());
        let timestamp = object
            .remove("timestamp")
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Some(NewEvent { source: source.to_string(), event_type, timestamp, data: object.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json_object() {
        let line = r#"{"event_type":"login_failed","user":"bob"}"#;
        let event = JsonParser.try_parse("app", line, Utc::now()).unwrap();
        assert_eq!(event.event_type, "login_failed");
        assert_eq!(event.data.get("user").unwrap(), "bob");
    }

    #[test]
    fn non_json_line_returns_none() {
        assert!(JsonParser.try_parse("app", "not json", Utc::now()).is_none());
    }

    #[test]
    fn json_array_is_rejected() {
        assert!(JsonParser.try_parse("app", "[1,2,3]", Utc::now()).is_none());
    }
}
