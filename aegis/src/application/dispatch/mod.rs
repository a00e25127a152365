// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The Alert Dispatcher: consumes raised alerts and fans each one out to
//! every channel its severity is routed to, retrying each send
//! independently so one slow or failing channel never blocks another.

pub mod channels;

use crate::infrastructure::retry::with_backoff;
use aegis_domain::entities::{Alert, Severity};
use aegis_domain::error::AegisError;
use aegis_domain::repositories::{BusRecord, Consumer};
use channels::{AlertChannel, ChannelError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Which channels a severity fans out to. Built once from config and
/// held immutably for the dispatcher's lifetime — routing never changes
/// mid-run, only across a restart.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<Severity, Vec<String>>,
}

impl RoutingTable {
    pub fn new(routes: HashMap<Severity, Vec<String>>) -> Self {
        Self { routes }
    }

    fn channels_for(&self, severity: Severity) -> &[String] {
        self.routes.get(&severity).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Consumes `alerts` and sends each one to every channel its severity is
/// routed to. A channel send that exhausts its retries is logged as a
/// permanent failure for that channel only; it never prevents delivery
/// to the alert's other routed channels.
pub struct AlertDispatcher {
    consumer: Arc<dyn Consumer>,
    routing: RoutingTable,
    channels: HashMap<String, Arc<dyn AlertChannel>>,
    retry_max_attempts: u32,
}

impl AlertDispatcher {
    pub fn new(consumer: Arc<dyn Consumer>, routing: RoutingTable, channels: Vec<Arc<dyn AlertChannel>>, retry_max_attempts: u32) -> Self {
        let channels = channels.into_iter().map(|c| (c.name().to_string(), c)).collect();
        Self { consumer, routing, channels, retry_max_attempts }
    }

    /// Polls one alert and sends it to every routed channel. Returns
    /// `false` when the poll timed out idle.
    pub async fn run_once(&self, poll_timeout: Duration) -> Result<bool, AegisError> {
        let Some(record) = self.consumer.poll(poll_timeout).await.map_err(|e| AegisError::upstream_unavailable(e.to_string()))? else {
            return Ok(false);
        };
        self.process(record).await?;
        Ok(true)
    }

    async fn process(&self, record: BusRecord) -> Result<(), AegisError> {
        let alert: Alert = serde_json::from_slice(&record.value)?;

        for channel_name in self.routing.channels_for(alert.severity) {
            let Some(channel) = self.channels.get(channel_name) else {
                error!(channel = %channel_name, "no channel registered for this routing table entry");
                continue;
            };
            self.send_with_retry(channel.as_ref(), &alert).await;
        }

        self.consumer.commit(&record).await.map_err(|e| AegisError::upstream_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn send_with_retry(&self, channel: &dyn AlertChannel, alert: &Alert) {
        let result = with_backoff(self.retry_max_attempts, || channel.send(alert)).await;
        match result {
            Ok(()) => info!(channel = channel.name(), alert_id = %alert.id, "alert dispatched"),
            Err(ChannelError::Permanent(message)) => error!(channel = channel.name(), alert_id = %alert.id, error = %message, "alert dispatch failed permanently"),
            Err(ChannelError::Transient(message)) => error!(channel = channel.name(), alert_id = %alert.id, error = %message, "alert dispatch exhausted retries"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bus::InMemoryBus;
    use async_trait::async_trait;
    use serde_json::json;
    use uuid::Uuid;

    struct RecordingChannel {
        sent: parking_lot::Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl AlertChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
            self.sent.lock().push(alert.id);
            Ok(())
        }
    }

    fn sample_alert(severity: Severity) -> Alert {
        Alert::raise("rule-1", "Repeated failed logins", severity, "desc", Uuid::new_v4(), json!({ "src_ip": "10.0.0.1" }), vec![]).unwrap()
    }

    #[tokio::test]
    async fn alert_is_sent_to_every_channel_routed_for_its_severity() {
        let bus = Arc::new(InMemoryBus::new());
        let consumer: Arc<dyn Consumer> = Arc::new(bus.consumer("alerts").unwrap());
        let channel = Arc::new(RecordingChannel { sent: parking_lot::Mutex::new(Vec::new()) });
        let mut routes = HashMap::new();
        routes.insert(Severity::High, vec!["recording".to_string()]);
        let dispatcher = AlertDispatcher::new(consumer, RoutingTable::new(routes), vec![channel.clone()], 3);

        let alert = sample_alert(Severity::High);
        bus.publish("alerts", &alert.rule_id, serde_json::to_vec(&alert).unwrap(), Duration::from_secs(1)).await.unwrap();

        assert!(dispatcher.run_once(Duration::from_secs(1)).await.unwrap());
        assert_eq!(channel.sent.lock().as_slice(), &[alert.id]);
    }

    #[tokio::test]
    async fn severity_with_no_route_sends_nowhere() {
        let bus = Arc::new(InMemoryBus::new());
        let consumer: Arc<dyn Consumer> = Arc::new(bus.consumer("alerts").unwrap());
        let channel = Arc::new(RecordingChannel { sent: parking_lot::Mutex::new(Vec::new()) });
        let dispatcher = AlertDispatcher::new(consumer, RoutingTable::default(), vec![channel.clone()], 3);

        let alert = sample_alert(Severity::Low);
        bus.publish("alerts", &alert.rule_id, serde_json::to_vec(&alert).unwrap(), Duration::from_secs(1)).await.unwrap();

        assert!(dispatcher.run_once(Duration::from_secs(1)).await.unwrap());
        assert!(channel.sent.lock().is_empty());
    }
}
