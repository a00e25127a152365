// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::error::AegisError;
use aegis_domain::repositories::{Ack, BusError, BusRecord, Consumer, HealthCheck, MessageBus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Topic {
    tx: mpsc::UnboundedSender<BusRecord>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<BusRecord>>>,
    next_offset: AtomicI64,
}

/// A single-process stand-in for a partitioned message bus, for tests
/// and for running the whole pipeline without a Kafka cluster. Every
/// topic has exactly one partition (`0`) and at most one consumer — a
/// second call to [`InMemoryBus::consumer`] for the same topic fails.
#[derive(Default)]
pub struct InMemoryBus {
    topics: Mutex<HashMap<String, Arc<Topic>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        let mut topics = self.topics.lock();
        topics
            .entry(name.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                Arc::new(Topic { tx, rx: Mutex::new(Some(rx)), next_offset: AtomicI64::new(0) })
            })
            .clone()
    }

    /// Claims the consuming side of `topic`. Fails if already claimed.
    pub fn consumer(&self, topic: &str) -> Result<InMemoryConsumer, BusError> {
        let handle = self.topic(topic);
        let rx = handle.rx.lock().take().ok_or_else(|| BusError::Unavailable(format!("topic '{topic}' already has a consumer")))?;
        Ok(InMemoryConsumer { rx: Mutex::new(rx) })
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, key: &str, value: Vec<u8>, _timeout: Duration) -> Result<Ack, BusError> {
        let handle = self.topic(topic);
        let offset = handle.next_offset.fetch_add(1, Ordering::SeqCst);
        let record = BusRecord { topic: topic.to_string(), partition: 0, offset, key: Some(key.to_string()), value };
        handle.tx.send(record).map_err(|_| BusError::Unavailable(format!("topic '{topic}' has no consumer")))?;
        Ok(Ack { partition: 0, offset })
    }
}

#[async_trait]
impl HealthCheck for InMemoryBus {
    fn component(&self) -> &'static str {
        "bus"
    }

    /// Always healthy — there is no socket to lose, only a process to
    /// be running in.
    async fn ping(&self) -> Result<(), AegisError> {
        Ok(())
    }
}

pub struct InMemoryConsumer {
    rx: Mutex<mpsc::UnboundedReceiver<BusRecord>>,
}

#[async_trait]
impl Consumer for InMemoryConsumer {
    async fn poll(&self, timeout: Duration) -> Result<Option<BusRecord>, BusError> {
        let mut rx = self.rx.lock();
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => Err(BusError::Unavailable("producer side dropped".to_string())),
            Err(_elapsed) => Ok(None),
        }
    }

    async fn commit(&self, _record: &BusRecord) -> Result<(), BusError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_poll_round_trips() {
        let bus = InMemoryBus::new();
        let consumer = bus.consumer("events").unwrap();
        bus.publish("events", "k1", b"hello".to_vec(), Duration::from_secs(1)).await.unwrap();
        let record = consumer.poll(Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!(record.value, b"hello");
        assert_eq!(record.key.as_deref(), Some("k1"));
        consumer.commit(&record).await.unwrap();
    }

    #[tokio::test]
    async fn poll_times_out_when_empty() {
        let bus = InMemoryBus::new();
        let consumer = bus.consumer("quiet").unwrap();
        let result = consumer.poll(Duration::from_millis(20)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn second_consumer_for_same_topic_fails() {
        let bus = InMemoryBus::new();
        let _first = bus.consumer("events").unwrap();
        assert!(bus.consumer("events").is_err());
    }

    #[tokio::test]
    async fn health_check_reports_component_and_is_always_ok() {
        let bus = InMemoryBus::new();
        assert_eq!(bus.component(), "bus");
        assert!(bus.ping().await.is_ok());
    }
}
