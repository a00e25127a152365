// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::infrastructure::dedup::TtlLruCache;
use crate::infrastructure::retry::with_backoff;
use aegis_domain::entities::Event;
use aegis_domain::error::AegisError;
use aegis_domain::repositories::{BusRecord, Consumer, IndexClient, MessageBus};
use aegis_domain::services::enrich::Enricher;
use aegis_domain::{Fingerprint, IndexKey};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Consumes `raw_logs`, runs the five-step pipeline (dedup, normalize,
/// enrich, index, tap-to-detection), and commits the offset only once
/// the event has landed durably — in the index on success, or in the
/// dead-letter topic after retries are exhausted.
pub struct ProcessorService {
    bus: Arc<dyn MessageBus>,
    consumer: Arc<dyn Consumer>,
    index: Arc<dyn IndexClient>,
    dedup: TtlLruCache,
    enrichers: Vec<Arc<dyn Enricher>>,
    index_prefix: String,
    enriched_topic: String,
    dead_letter_topic: String,
    index_retry_max_attempts: u32,
    ack_timeout: Duration,
}

impl ProcessorService {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        consumer: Arc<dyn Consumer>,
        index: Arc<dyn IndexClient>,
        dedup: TtlLruCache,
        enrichers: Vec<Arc<dyn Enricher>>,
        index_prefix: impl Into<String>,
        enriched_topic: impl Into<String>,
        dead_letter_topic: impl Into<String>,
        index_retry_max_attempts: u32,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            bus,
            consumer,
            index,
            dedup,
            enrichers,
            index_prefix: index_prefix.into(),
            enriched_topic: enriched_topic.into(),
            dead_letter_topic: dead_letter_topic.into(),
            index_retry_max_attempts,
            ack_timeout,
        }
    }

    /// Polls one record and runs it through the pipeline. Returns `false`
    /// if the poll timed out with nothing to process, so callers can loop
    /// without distinguishing "idle" from "error."
    pub async fn run_once(&self, poll_timeout: Duration) -> Result<bool, AegisError> {
        let Some(record) = self.consumer.poll(poll_timeout).await.map_err(|e| AegisError::upstream_unavailable(e.to_string()))? else {
            return Ok(false);
        };
        self.process(record).await?;
        Ok(true)
    }

    async fn process(&self, record: BusRecord) -> Result<(), AegisError> {
        let mut event: Event = serde_json::from_slice(&record.value)?;

        let fingerprint = Fingerprint::compute(&event.source, &event.event_type, &event.data);
        if self.dedup.check_and_insert(&fingerprint.to_hex()) {
            self.consumer.commit(&record).await.map_err(|e| AegisError::upstream_unavailable(e.to_string()))?;
            return Ok(());
        }

        event.enrich("processing_timestamp", json!(chrono::Utc::now().to_rfc3339()));

        for enricher in &self.enrichers {
            if let Err(err) = enricher.enrich(&mut event).await {
                warn!(enricher = enricher.name(), error = %err, "enrichment step failed, continuing");
                event.record_enrichment_error(enricher.name(), err.to_string());
            }
        }

        let key = IndexKey::from_timestamp(event.timestamp);
        let index = &self.index;
        let prefix = &self.index_prefix;
        let attempted = &event;
        let result = with_backoff(self.index_retry_max_attempts, || index.put(prefix, key, attempted)).await;

        match result {
            Ok(()) => {
                let value = serde_json::to_vec(&event)?;
                self.bus
                    .publish(&self.enriched_topic, &event.source, value, self.ack_timeout)
                    .await
                    .map_err(|e| AegisError::upstream_unavailable(e.to_string()))?;
                self.consumer.commit(&record).await.map_err(|e| AegisError::upstream_unavailable(e.to_string()))?;
                Ok(())
            }
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "index write exhausted retries, routing to dead-letter topic");
                let payload = json!({ "original_value": event, "last_error": err.to_string() });
                let dead_letter_value = serde_json::to_vec(&payload)?;
                self.bus
                    .publish(&self.dead_letter_topic, &event.source, dead_letter_value, self.ack_timeout)
                    .await
                    .map_err(|e| AegisError::upstream_unavailable(e.to_string()))?;
                self.consumer.commit(&record).await.map_err(|e| AegisError::upstream_unavailable(e.to_string()))?;
                info!(event_id = %event.id, "event dead-lettered after index-write failure");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bus::InMemoryBus;
    use crate::infrastructure::index::InMemoryIndexClient;
    use aegis_domain::entities::NewEvent;
    use aegis_domain::repositories::IndexError;
    use async_trait::async_trait;
    use serde_json::Map;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn make_event(source: &str) -> Event {
        Event::accept(NewEvent { source: source.into(), event_type: "deny".into(), timestamp: None, data: Map::new() }).unwrap()
    }

    struct AlwaysFailsIndex {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl IndexClient for AlwaysFailsIndex {
        async fn put(&self, _prefix: &str, _key: IndexKey, _event: &Event) -> Result<(), IndexError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(IndexError::Unavailable("simulated outage".into()))
        }

        async fn search(&self, _prefix: &str, _key: IndexKey, _field: &str, _value: &serde_json::Value, _limit: usize) -> Result<Vec<Event>, IndexError> {
            Ok(vec![])
        }

        async fn ensure_template(&self, _prefix: &str, _policy: aegis_domain::repositories::LifecyclePolicy) -> Result<(), IndexError> {
            Ok(())
        }
    }

    fn processor(bus: Arc<InMemoryBus>, index: Arc<dyn IndexClient>) -> (ProcessorService, Arc<dyn Consumer>, Arc<dyn Consumer>) {
        let consumer: Arc<dyn Consumer> = Arc::new(bus.consumer("raw_logs").unwrap());
        let enriched: Arc<dyn Consumer> = Arc::new(bus.consumer("enriched_logs").unwrap());
        let dead_letter: Arc<dyn Consumer> = Arc::new(bus.consumer("dead_letters").unwrap());
        let processor = ProcessorService::new(
            bus,
            consumer,
            index,
            TtlLruCache::new(1000, Duration::from_secs(300)),
            vec![],
            "logs",
            "enriched_logs",
            "dead_letters",
            3,
            Duration::from_secs(1),
        );
        (processor, enriched, dead_letter)
    }

    #[tokio::test]
    async fn indexes_and_forwards_to_enriched_topic() {
        let bus = Arc::new(InMemoryBus::new());
        let index: Arc<dyn IndexClient> = Arc::new(InMemoryIndexClient::new());
        let (processor, enriched, _dead_letter) = processor(bus.clone(), index.clone());

        bus.publish("raw_logs", "firewall", serde_json::to_vec(&make_event("firewall")).unwrap(), Duration::from_secs(1)).await.unwrap();

        let processed = processor.run_once(Duration::from_secs(1)).await.unwrap();
        assert!(processed);

        let record = enriched.poll(Duration::from_secs(1)).await.unwrap().unwrap();
        let event: Event = serde_json::from_slice(&record.value).unwrap();
        assert!(event.enriched().contains_key("processing_timestamp"));
    }

    #[tokio::test]
    async fn duplicate_event_is_committed_without_reindexing() {
        let bus = Arc::new(InMemoryBus::new());
        let index: Arc<dyn IndexClient> = Arc::new(InMemoryIndexClient::new());
        let (processor, enriched, _dead_letter) = processor(bus.clone(), index.clone());

        let event = make_event("firewall");
        bus.publish("raw_logs", "firewall", serde_json::to_vec(&event).unwrap(), Duration::from_secs(1)).await.unwrap();
        bus.publish("raw_logs", "firewall", serde_json::to_vec(&event).unwrap(), Duration::from_secs(1)).await.unwrap();

        assert!(processor.run_once(Duration::from_secs(1)).await.unwrap());
        assert!(processor.run_once(Duration::from_secs(1)).await.unwrap());

        let first = enriched.poll(Duration::from_millis(200)).await.unwrap();
        assert!(first.is_some());
        let second = enriched.poll(Duration::from_millis(200)).await.unwrap();
        assert!(second.is_none(), "the duplicate must not be forwarded to enriched_logs");
    }

    #[tokio::test]
    async fn exhausted_retries_route_to_dead_letter() {
        let bus = Arc::new(InMemoryBus::new());
        let index: Arc<dyn IndexClient> = Arc::new(AlwaysFailsIndex { attempts: AtomicU32::new(0) });
        let (processor, _enriched, dead_letter) = processor(bus.clone(), index);

        bus.publish("raw_logs", "firewall", serde_json::to_vec(&make_event("firewall")).unwrap(), Duration::from_secs(1)).await.unwrap();
        assert!(processor.run_once(Duration::from_secs(1)).await.unwrap());

        let record = dead_letter.poll(Duration::from_secs(1)).await.unwrap().unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&record.value).unwrap();
        assert!(payload.get("last_error").is_some());
    }

    #[tokio::test]
    async fn idle_poll_returns_false() {
        let bus = Arc::new(InMemoryBus::new());
        let index: Arc<dyn IndexClient> = Arc::new(InMemoryIndexClient::new());
        let (processor, _enriched, _dead_letter) = processor(bus, index);
        assert!(!processor.run_once(Duration::from_millis(20)).await.unwrap());
    }
}
