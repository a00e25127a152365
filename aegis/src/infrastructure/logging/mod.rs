// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Structured logging setup: JSON output in production, a human-readable
//! format when `AEGIS_LOG_FORMAT=pretty` is set — matching the teacher's
//! habit of defaulting to machine-readable logs and opting into a
//! developer-friendly format explicitly.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let pretty = std::env::var("AEGIS_LOG_FORMAT").map(|v| v == "pretty").unwrap_or(false);
    if pretty {
        fmt().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).json().with_current_span(true).with_span_list(true).init();
    }
}
