// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::NewEvent;
use aegis_domain::services::parser::{apache_combined_data, LogFormat, LogParser};
use chrono::{DateTime, Utc};
use regex::Regex;

/// The Apache/NGINX "combined" log format:
/// `host ident user [time] "request" status size "referrer" "user_agent"`.
pub struct ApacheCombinedParser {
    pattern: Regex,
}

impl ApacheCombinedParser {
    pub fn new() -> Self {
        let pattern = Regex::new(
            r#"^(?P<host>\S+) (?P<ident>\S+) (?P<user>\S+) \[(?P<time>[^\]]+)\] "(?P<request>[^"]*)" (?P<status>\d{3}) (?P<size>\S+)(?: "(?P<referrer>[^"]*)" "(?P<user_agent>[^"]*)")?$"#,
        )
        .expect("apache combined regex is statically valid");
        Self { pattern }
    }
}

impl Default for ApacheCombinedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser for ApacheCombinedParser {
    fn format(&self) -> LogFormat {
        LogFormat::ApacheCombined
    }

    fn try_parse(&self, source: &str, line: &str, _now: DateTime<Utc>) -> Option<NewEvent> {
        let captures = self.pattern.captures(line)?;
        let time_str = &captures["time"];
        let timestamp = DateTime::parse_from_str(time_str, "%d/%b/%Y:%H:%M:%S %z").ok()?.with_timezone(&Utc);
        let status: u16 = captures["status"].parse().ok()?;
        let size = captures["size"].parse::<u64>().ok();

        let data = apache_combined_data(
            &captures["host"],
            &captures["ident"],
            &captures["user"],
            &captures["request"],
            status,
            size,
            captures.name("referrer").map(|m| m.as_str()).unwrap_or("-"),
            captures.name("user_agent").map(|m| m.as_str()).unwrap_or("-"),
        );

        Some(NewEvent { source: source.to_string(), event_type: "http_access".to_string(), timestamp: Some(timestamp), data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sample_combined_line() {
        let parser = ApacheCombinedParser::new();
        let line = r#"127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326"#;
        let event = parser.try_parse("apache", line, Utc::now()).expect("should parse");
        assert_eq!(event.data.get("remote_host").unwrap(), "127.0.0.1");
        assert_eq!(event.data.get("status").unwrap(), 200);
        assert_eq!(event.timestamp.unwrap().format("%Y-%m").to_string(), "2000-10");
    }

    #[test]
    fn non_matching_line_returns_none() {
        let parser = ApacheCombinedParser::new();
        assert!(parser.try_parse("apache", "not a log line", Utc::now()).is_none());
    }
}
