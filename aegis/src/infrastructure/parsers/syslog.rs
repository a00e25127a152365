// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::NewEvent;
use aegis_domain::services::parser::{resolve_syslog_year, LogFormat, LogParser};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<month>[A-Za-z]{3})\s+(?P<day>\d{1,2}) (?P<time>\d{2}:\d{2}:\d{2}) (?P<host>\S+) (?P<program>[^\[:]+)(?:\[(?P<pid>\d+)\])?: (?P<message>.*)$")
        .expect("syslog regex is statically valid")
});

/// BSD-style syslog: `MMM d HH:mm:ss host program[pid]: message`. The
/// year is absent from the wire format and is reconstructed via
/// [`resolve_syslog_year`] relative to `now`.
pub struct SyslogParser;

impl LogParser for SyslogParser {
    fn format(&self) -> LogFormat {
        LogFormat::Syslog
    }

    fn try_parse(&self, source: &str, line: &str, now: DateTime<Utc>) -> Option<NewEvent> {
        let captures = PATTERN.captures(line)?;
        let month = month_number(&captures["month"])?;
        let day: u32 = captures["day"].parse().ok()?;
        let year = resolve_syslog_year(month, now);

        let naive_date = NaiveDate::from_ymd_opt(year, month, day)?;
        let naive_time = chrono::NaiveTime::parse_from_str(&captures["time"], "%H:%M:%S").ok()?;
        let naive = naive_date.and_time(naive_time);
        let timestamp = Utc.from_utc_datetime(&naive);

        let mut data = Map::new();
        data.insert("host".into(), Value::String(captures["host"].to_string()));
        data.insert("program".into(), Value::String(captures["program"].trim().to_string()));
        data.insert("pid".into(), captures.name("pid").and_then(|m| m.as_str().parse::<u64>().ok()).map(Value::from).unwrap_or(Value::Null));
        data.insert("message".into(), Value::String(captures["message"].to_string()));

        Some(NewEvent { source: source.to_string(), event_type: "syslog".to_string(), timestamp: Some(timestamp), data })
    }
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
    let lower = name.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == lower).map(|idx| idx as u32 + 1)
}
