// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::{Event, EventBatch, NewEvent, RawLogRequest};
use aegis_domain::error::AegisError;
use aegis_domain::services::parser::{parse_with, LogFormat, LogParser};
use aegis_domain::MessageBus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Accepts client-submitted events, fills in missing fields, and
/// publishes them onto the raw-events topic partitioned by `source`.
/// Nothing here touches dedup, enrichment, or indexing — those are the
/// Processor's job once an event is off the bus.
pub struct CollectorService {
    bus: Arc<dyn MessageBus>,
    raw_topic: String,
    ack_timeout: Duration,
    parsers: Vec<Box<dyn LogParser>>,
}

/// The per-event outcome reported inside a batch response.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub status: &'static str,
    pub id: Option<Uuid>,
    pub error: Option<String>,
}

/// `{total, successful, failed}` summary plus per-event detail, matching
/// the batch ingest contract: a 200 is returned even on partial failure.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<IngestResult>,
}

impl CollectorService {
    pub fn new(bus: Arc<dyn MessageBus>, raw_topic: impl Into<String>, ack_timeout: Duration, parsers: Vec<Box<dyn LogParser>>) -> Self {
        Self { bus, raw_topic: raw_topic.into(), ack_timeout, parsers }
    }

    /// Accepts and publishes a single event. On ack timeout or producer
    /// error the event is not considered published — no partial write.
    pub async fn ingest(&self, new_event: NewEvent) -> Result<Uuid, AegisError> {
        let event = Event::accept(new_event)?;
        self.publish(&event).await?;
        Ok(event.id)
    }

    async fn publish(&self, event: &Event) -> Result<(), AegisError> {
        let value = serde_json::to_vec(event)?;
        self.bus
            .publish(&self.raw_topic, &event.source, value, self.ack_timeout)
            .await
            .map_err(|e| AegisError::upstream_unavailable(e.to_string()))?;
        Ok(())
    }

    /// Per-event independence: every event in the batch is attempted
    /// even if an earlier one failed. The caller is expected to have
    /// already enforced the hard request-level gates (auth, scope,
    /// rate limit) before calling this.
    pub async fn ingest_batch(&self, batch: EventBatch) -> BatchResult {
        let mut results = Vec::with_capacity(batch.events.len());
        let mut successful = 0usize;
        for new_event in batch.events {
            match self.ingest(new_event).await {
                Ok(id) => {
                    successful += 1;
                    results.push(IngestResult { status: "success", id: Some(id), error: None });
                }
                Err(err) => {
                    results.push(IngestResult { status: "error", id: None, error: Some(err.to_string()) });
                }
            }
        }
        let total = results.len();
        BatchResult { total, successful, failed: total - successful, results }
    }

    /// Parses a raw log line (auto-detecting format when `format` is
    /// absent) and ingests the resulting event.
    pub async fn ingest_raw(&self, request: RawLogRequest, now: DateTime<Utc>) -> Result<Uuid, AegisError> {
        let format = match &request.format {
            Some(name) => LogFormat::parse_name(name)?,
            None => LogFormat::Auto,
        };
        let new_event = parse_with(&self.parsers, format, &request.source, &request.log_line, now)?;
        self.ingest(new_event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bus::InMemoryBus;
    use crate::infrastructure::parsers::default_parsers;
    use aegis_domain::repositories::Consumer;
    use serde_json::Map;

    fn service(bus: Arc<InMemoryBus>) -> CollectorService {
        CollectorService::new(bus, "raw_logs", Duration::from_secs(1), default_parsers())
    }

    #[tokio::test]
    async fn ingest_publishes_and_returns_id() {
        let bus = Arc::new(InMemoryBus::new());
        let consumer = bus.consumer("raw_logs").unwrap();
        let collector = service(bus);

        let id = collector
            .ingest(NewEvent { source: "firewall".into(), event_type: "deny".into(), timestamp: None, data: Map::new() })
            .await
            .unwrap();

        let record = consumer.poll(Duration::from_secs(1)).await.unwrap().unwrap();
        let event: Event = serde_json::from_slice(&record.value).unwrap();
        assert_eq!(event.id, id);
    }

    #[tokio::test]
    async fn ingest_rejects_empty_source() {
        let bus = Arc::new(InMemoryBus::new());
        let collector = service(bus);
        let result = collector.ingest(NewEvent { source: "".into(), event_type: "deny".into(), timestamp: None, data: Map::new() }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn batch_reports_partial_failure() {
        let bus = Arc::new(InMemoryBus::new());
        let _consumer = bus.consumer("raw_logs").unwrap();
        let collector = service(bus);

        let batch = EventBatch {
            events: vec![
                NewEvent { source: "firewall".into(), event_type: "deny".into(), timestamp: None, data: Map::new() },
                NewEvent { source: "".into(), event_type: "deny".into(), timestamp: None, data: Map::new() },
            ],
        };
        let result = collector.ingest_batch(batch).await;
        assert_eq!(result.total, 2);
        assert_eq!(result.successful, 1);
        assert_eq!(result.failed, 1);
    }

    #[tokio::test]
    async fn ingest_raw_auto_detects_json() {
        let bus = Arc::new(InMemoryBus::new());
        let consumer = bus.consumer("raw_logs").unwrap();
        let collector = service(bus);

        let id = collector
            .ingest_raw(RawLogRequest { source: "app".into(), log_line: r#"{"event_type":"startup"}"#.into(), format: None }, Utc::now())
            .await
            .unwrap();

        let record = consumer.poll(Duration::from_secs(1)).await.unwrap().unwrap();
        let event: Event = serde_json::from_slice(&record.value).unwrap();
        assert_eq!(event.id, id);
        assert_eq!(event.event_type, "startup");
    }
}
