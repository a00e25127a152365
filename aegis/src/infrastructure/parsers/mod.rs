// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concrete [`aegis_domain::services::parser::LogParser`] implementations.
//! Kept out of the domain crate because they depend on `regex` for
//! grammar matching; [`aegis_domain::services::parser`] itself stays
//! limited to dispatch logic and pure helpers shared across them.

mod apache;
mod json;
mod syslog;

pub use apache::ApacheCombinedParser;
pub use json::JsonParser;
pub use syslog::SyslogParser;

/// The standard parser set registered with `auto`-detection: one of
/// each supported format.
pub fn default_parsers() -> Vec<Box<dyn aegis_domain::services::parser::LogParser>> {
    vec![Box::new(JsonParser), Box::new(ApacheCombinedParser::new()), Box::new(SyslogParser)]
}
