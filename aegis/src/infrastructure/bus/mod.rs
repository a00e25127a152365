// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! [`aegis_domain::repositories::MessageBus`]/[`aegis_domain::repositories::Consumer`]
//! adapters: Kafka for production, an in-memory broadcast channel for
//! tests and local single-process runs.

mod inmem;
mod kafka;

pub use inmem::InMemoryBus;
pub use kafka::{KafkaBus, KafkaConsumer};
