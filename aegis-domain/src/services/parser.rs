// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::entities::NewEvent;
use crate::error::AegisError;
use chrono::{DateTime, Datelike, Utc};
use serde_json::{Map, Value};

/// The log line formats recognized by `/ingest/raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    ApacheCombined,
    Syslog,
    Json,
    Auto,
}

impl LogFormat {
    pub fn parse_name(name: &str) -> Result<Self, AegisError> {
        match name {
            "apache_combined" => Ok(Self::ApacheCombined),
            "syslog" => Ok(Self::Syslog),
            "json" => Ok(Self::Json),
            "auto" => Ok(Self::Auto),
            other => Err(AegisError::validation(format!("unknown log format '{other}'"))),
        }
    }
}

/// A named, stateless log line parser. Concrete implementations
/// (Apache combined, BSD syslog, bare JSON) live in the `aegis`
/// application crate's `infrastructure::parsers` module so the domain
/// crate stays free of the regex/chrono-format specifics; this trait is
/// the seam between the two.
pub trait LogParser: Send + Sync {
    fn format(&self) -> LogFormat;

    /// Parses one raw log line into event fields, or `None` if the line
    /// does not match this parser's grammar.
    fn try_parse(&self, source: &str, line: &str, now: DateTime<Utc>) -> Option<NewEvent>;
}

/// Dispatches `line` to `parsers` by declared `format`, or — for
/// [`LogFormat::Auto`] — tries each parser in turn (json, then
/// apache_combined, then syslog; first match wins) per the fixed
/// precedence order used for format auto-detection.
pub fn parse_with(parsers: &[Box<dyn LogParser>], format: LogFormat, source: &str, line: &str, now: DateTime<Utc>) -> Result<NewEvent, AegisError> {
    match format {
        LogFormat::Auto => {
            for preferred in [LogFormat::Json, LogFormat::ApacheCombined, LogFormat::Syslog] {
                if let Some(parser) = parsers.iter().find(|p| p.format() == preferred) {
                    if let Some(event) = parser.try_parse(source, line, now) {
                        return Ok(event);
                    }
                }
            }
            Err(AegisError::validation("could not parse log line with any known format"))
        }
        requested => parsers
            .iter()
            .find(|p| p.format() == requested)
            .and_then(|p| p.try_parse(source, line, now))
            .ok_or_else(|| AegisError::validation("could not parse log line")),
    }
}

/// Injects the syslog year-rollover rule shared by every BSD syslog
/// parser implementation: a bare `MMM d` stamp takes the current year
/// unless the parsed month is later than `now`'s month, in which case it
/// must be from the previous year (handles a line dated e.g. Dec 31
/// being ingested on Jan 1).
pub fn resolve_syslog_year(parsed_month: u32, now: DateTime<Utc>) -> i32 {
    if parsed_month <= now.month() {
        now.year()
    } else {
        now.year() - 1
    }
}

/// Builds the canonical `data` map for a parsed Apache combined log
/// record, given its already-extracted fields. Kept in the domain crate
/// so the field names are defined once and shared by the Apache parser
/// and by any future fixture-based tests.
#[allow(clippy::too_many_arguments)]
pub fn apache_combined_data(remote_host: &str, ident: &str, user: &str, request: &str, status: u16, size: Option<u64>, referrer: &str, user_agent: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("remote_host".into(), Value::String(remote_host.to_string()));
    data.insert("ident".into(), Value::String(ident.to_string()));
    data.insert("user".into(), Value::String(user.to_string()));
    data.insert("request".into(), Value::String(request.to_string()));
    data.insert("status".into(), Value::Number(status.into()));
    data.insert("size".into(), size.map(Value::from).unwrap_or(Value::Null));
    data.insert("referrer".into(), Value::String(referrer.to_string()));
    data.insert("user_agent".into(), Value::String(user_agent.to_string()));
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn unknown_format_name_is_rejected() {
        assert!(LogFormat::parse_name("pcap").is_err());
    }

    #[test]
    fn syslog_year_rollover_uses_previous_year() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(resolve_syslog_year(12, now), 2025);
        assert_eq!(resolve_syslog_year(1, now), 2026);
    }

    #[test]
    fn apache_combined_data_maps_known_fields() {
        let data = apache_combined_data("127.0.0.1", "-", "frank", "GET /apache_pb.gif HTTP/1.0", 200, Some(2326), "-", "-");
        assert_eq!(data.get("remote_host").unwrap(), "127.0.0.1");
        assert_eq!(data.get("status").unwrap(), 200);
    }
}
