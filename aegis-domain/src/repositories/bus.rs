// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("publish to '{topic}' timed out after {elapsed:?}")]
    Timeout { topic: String, elapsed: Duration },
    #[error("bus unavailable: {0}")]
    Unavailable(String),
    #[error("bus producer error: {0}")]
    Producer(String),
}

/// Acknowledgement of a successfully published message: the partition it
/// landed in and its offset, enough for a consumer-side test to assert
/// ordering without depending on a specific broker's wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub partition: i32,
    pub offset: i64,
}

/// A partitioned publish/subscribe message bus. `key` determines which
/// partition a message lands in — same key, same partition, preserving
/// per-key ordering — matching the ordering property required between
/// the Collector and Processor.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, value: Vec<u8>, timeout: Duration) -> Result<Ack, BusError>;
}

/// One record read back off a bus topic, paired with enough positional
/// information to `commit` it.
#[derive(Debug, Clone)]
pub struct BusRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub value: Vec<u8>,
}

/// A consumer-group member able to poll records and commit offsets.
/// Offsets are committed only after the record's effects (index write,
/// alert raise) are durable, so a crash between `poll` and `commit`
/// redelivers rather than silently dropping a record.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn poll(&self, timeout: Duration) -> Result<Option<BusRecord>, BusError>;
    async fn commit(&self, record: &BusRecord) -> Result<(), BusError>;
}
