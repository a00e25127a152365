// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::error::AegisError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A single normalized log record flowing through the pipeline.
///
/// `id`, `source`, `event_type`, and `timestamp` are required once an event
/// has been accepted by the Collector. `enriched` is append-only and is
/// populated exclusively by the Processor — nothing outside this crate's
/// `entities::event` module and the `aegis` application's processor module
/// can construct an `Event` with a non-empty `enriched` map directly;
/// enrichment goes through [`Event::enrich`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub data: Map<String, Value>,
    #[serde(default)]
    enriched: Map<String, Value>,
}

/// The shape clients submit to `/ingest`: everything but `id` is supplied
/// by the caller, `timestamp` is optional and filled with wall-clock UTC
/// on accept if absent.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub source: String,
    pub event_type: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Event {
    /// Accepts a client-submitted event, assigning a fresh `id` and filling
    /// `timestamp` from the wall clock if the caller omitted it.
    pub fn accept(new_event: NewEvent) -> Result<Self, AegisError> {
        if new_event.source.trim().is_empty() {
            return Err(AegisError::validation("source must not be empty"));
        }
        if new_event.event_type.trim().is_empty() {
            return Err(AegisError::validation("event_type must not be empty"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            source: new_event.source,
            event_type: new_event.event_type,
            timestamp: new_event.timestamp.unwrap_or_else(Utc::now),
            data: new_event.data,
            enriched: Map::new(),
        })
    }

    pub fn enriched(&self) -> &Map<String, Value> {
        &self.enriched
    }

    /// Appends a single enriched field. Only the Processor's enrichment
    /// step should call this — it is the one place `enriched` is ever
    /// written, matching spec.md's "enriched is append-only and never
    /// written by clients" invariant.
    pub fn enrich(&mut self, key: impl Into<String>, value: Value) {
        self.enriched.insert(key.into(), value);
    }

    /// Appends an enrichment error, following the non-fatal enrichment
    /// failure contract: `enriched.errors[]` accumulates one entry per
    /// failed enricher without aborting the event.
    pub fn record_enrichment_error(&mut self, enricher: &str, message: impl Into<String>) {
        let entry = serde_json::json!({ "enricher": enricher, "error": message.into() });
        match self.enriched.get_mut("errors").and_then(|v| v.as_array_mut()) {
            Some(errors) => errors.push(entry),
            None => {
                self.enriched.insert("errors".to_string(), Value::Array(vec![entry]));
            }
        }
    }

    /// Reads a dotted field path (e.g. `"data.src_ip"` or
    /// `"enriched.geo.country"`) used by the custom rule evaluator and by
    /// playbook template rendering. `"source"`, `"event_type"`, and
    /// `"timestamp"` resolve to the corresponding scalar fields; anything
    /// else is looked up under `data` or `enriched`.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let root = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        let current = match root {
            "source" if rest.is_empty() => return Some(Value::String(self.source.clone())),
            "event_type" if rest.is_empty() => return Some(Value::String(self.event_type.clone())),
            "timestamp" if rest.is_empty() => return Some(Value::String(self.timestamp.to_rfc3339())),
            "data" => {
                let (head, tail) = rest.split_first()?;
                let mut cur = self.data.get(*head)?;
                for seg in tail {
                    cur = cur.get(seg)?;
                }
                cur.clone()
            }
            "enriched" => {
                let (head, tail) = rest.split_first()?;
                let mut cur = self.enriched.get(*head)?;
                for seg in tail {
                    cur = cur.get(seg)?;
                }
                cur.clone()
            }
            _ => return None,
        };
        Some(current)
    }
}

/// An ordered sequence of events carried in one `/ingest/batch` request.
#[derive(Debug, Clone, Deserialize)]
pub struct EventBatch {
    pub events: Vec<NewEvent>,
}

/// The body of a `/ingest/raw` request: one unparsed log line plus the
/// producer's declared format (or `None` for auto-detection).
#[derive(Debug, Clone, Deserialize)]
pub struct RawLogRequest {
    pub source: String,
    pub log_line: String,
    #[serde(default)]
    pub format: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_fills_missing_timestamp() {
        let event = Event::accept(NewEvent {
            source: "firewall".into(),
            event_type: "deny".into(),
            timestamp: None,
            data: Map::new(),
        })
        .unwrap();
        assert!(event.timestamp <= Utc::now());
    }

    #[test]
    fn accept_rejects_empty_source() {
        let result = Event::accept(NewEvent { source: "".into(), event_type: "deny".into(), timestamp: None, data: Map::new() });
        assert!(result.is_err());
    }

    #[test]
    fn enrichment_errors_accumulate() {
        let mut event = Event::accept(NewEvent { source: "firewall".into(), event_type: "deny".into(), timestamp: None, data: Map::new() })
            .unwrap();
        event.record_enrichment_error("geoip", "lookup timed out");
        event.record_enrichment_error("rdns", "no ptr record");
        let errors = event.enriched().get("errors").unwrap().as_array().unwrap();
        assert_eq!(errors.len(), 2);
    }
}
