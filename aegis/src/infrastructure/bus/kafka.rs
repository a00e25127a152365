// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::error::AegisError;
use aegis_domain::repositories::{Ack, BusError, BusRecord, Consumer, HealthCheck, MessageBus};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as RdConsumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::message::Message;
use rdkafka::error::KafkaError;
use rdkafka::Offset;
use std::time::Duration;

/// Publishes onto a Kafka topic through a `FutureProducer`. `key`
/// determines partition placement, preserving per-key ordering between
/// the Collector and the Processor consumer group.
pub struct KafkaBus {
    producer: FutureProducer,
}

impl KafkaBus {
    pub fn new(bootstrap_servers: &str) -> Result<Self, BusError> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("message.timeout.ms", "30000")
            .create()
            .map_err(|e| BusError::Unavailable(e.to_string()))?;
        Ok(Self { producer })
    }
}

#[async_trait]
impl MessageBus for KafkaBus {
    async fn publish(&self, topic: &str, key: &str, value: Vec<u8>, timeout: Duration) -> Result<Ack, BusError> {
        let record = FutureRecord::to(topic).key(key).payload(&value);
        match self.producer.send(record, timeout).await {
            Ok((partition, offset)) => Ok(Ack { partition, offset }),
            Err((KafkaError::MessageProduction(rdkafka::types::RDKafkaErrorCode::MessageTimedOut), _)) => {
                Err(BusError::Timeout { topic: topic.to_string(), elapsed: timeout })
            }
            Err((err, _)) => Err(BusError::Producer(err.to_string())),
        }
    }
}

#[async_trait]
impl HealthCheck for KafkaBus {
    fn component(&self) -> &'static str {
        "bus"
    }

    /// Fetches cluster metadata as a liveness probe — cheap, and fails
    /// fast if no broker in `bootstrap.servers` is reachable.
    async fn ping(&self) -> Result<(), AegisError> {
        self.producer
            .client()
            .fetch_metadata(None, Duration::from_secs(5))
            .map_err(|e| AegisError::upstream_unavailable(format!("kafka metadata fetch failed: {e}")))?;
        Ok(())
    }
}

/// A consumer-group member reading a Kafka topic, committing offsets
/// only after a record's effects are durable.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(bootstrap_servers: &str, group_id: &str, topic: &str) -> Result<Self, BusError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| BusError::Unavailable(e.to_string()))?;
        RdConsumer::subscribe(&consumer, &[topic]).map_err(|e| BusError::Unavailable(e.to_string()))?;
        Ok(Self { consumer })
    }
}

#[async_trait]
impl Consumer for KafkaConsumer {
    async fn poll(&self, timeout: Duration) -> Result<Option<BusRecord>, BusError> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Ok(Ok(message)) => Ok(Some(BusRecord {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                value: message.payload().map(|p| p.to_vec()).unwrap_or_default(),
            })),
            Ok(Err(err)) => Err(BusError::Unavailable(err.to_string())),
            Err(_elapsed) => Ok(None),
        }
    }

    async fn commit(&self, record: &BusRecord) -> Result<(), BusError> {
        let mut tpl = rdkafka::TopicPartitionList::new();
        tpl.add_partition_offset(&record.topic, record.partition, Offset::Offset(record.offset + 1))
            .map_err(|e| BusError::Producer(e.to_string()))?;
        RdConsumer::commit(&self.consumer, &tpl, CommitMode::Sync).map_err(|e| BusError::Producer(e.to_string()))
    }
}
