// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use chrono::{DateTime, Datelike, Utc};
use std::fmt;

/// The `YYYY.MM` monthly bucket an event's index document lives in.
///
/// Combined with a configurable prefix this yields the index name, e.g.
/// `logs-2000.10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexKey {
    year: i32,
    month: u32,
}

impl IndexKey {
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        Self { year: timestamp.year(), month: timestamp.month() }
    }

    /// Renders the full index name for the given prefix, e.g.
    /// `IndexKey::from_timestamp(ts).index_name("logs")` => `"logs-2000.10"`.
    pub fn index_name(&self, prefix: &str) -> String {
        format!("{prefix}-{self}")
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}.{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_as_year_dot_month() {
        let ts = Utc.with_ymd_and_hms(2000, 10, 13, 13, 55, 36).unwrap();
        let key = IndexKey::from_timestamp(ts);
        assert_eq!(key.to_string(), "2000.10");
        assert_eq!(key.index_name("logs"), "logs-2000.10");
    }
}
