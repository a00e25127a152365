// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The Response Engine: consumes raised alerts, finds every enabled
//! playbook triggered by the alert's rule, and runs its actions in
//! declaration order against the registered [`drivers::ActionDriver`]
//! for each action's `action_type`.

pub mod drivers;
pub mod template;

use crate::infrastructure::repositories::SqlitePlaybookRunLog;
use aegis_domain::entities::{Alert, ActionCondition, Playbook, PlaybookAction, PlaybookRunRecord, RunStatus};
use aegis_domain::error::AegisError;
use aegis_domain::repositories::{BusRecord, Consumer, PlaybookStore};
use drivers::{call_with_timeout, ActionDriver};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Consumes `alerts`, finds triggered playbooks, and runs each one's
/// actions against the driver registered for its `action_type`.
/// Drivers are looked up by name so an action referencing an
/// unregistered `action_type` is skipped and logged rather than
/// panicking the whole run.
pub struct PlaybookRunner {
    consumer: Arc<dyn Consumer>,
    playbook_store: Arc<dyn PlaybookStore>,
    drivers: HashMap<String, Arc<dyn ActionDriver>>,
    run_log: Arc<SqlitePlaybookRunLog>,
}

impl PlaybookRunner {
    pub fn new(consumer: Arc<dyn Consumer>, playbook_store: Arc<dyn PlaybookStore>, drivers: Vec<Arc<dyn ActionDriver>>, run_log: Arc<SqlitePlaybookRunLog>) -> Self {
        let drivers = drivers.into_iter().map(|d| (d.name().to_string(), d)).collect();
        Self { consumer, playbook_store, drivers, run_log }
    }

    /// Polls one alert and runs every playbook it triggers. Returns
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
        let playbooks = self.playbook_store.snapshot();

        for playbook in playbooks.iter().filter(|p| p.triggered_by(&alert)) {
            self.run_playbook(playbook, &alert).await;
        }

        self.consumer.commit(&record).await.map_err(|e| AegisError::upstream_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn run_playbook(&self, playbook: &Playbook, alert: &Alert) {
        for action in &playbook.actions {
            if !conditions_hold(&action.conditions, alert) {
                self.log_run(playbook, alert, action, RunStatus::Skipped, 0, None).await;
                continue;
            }

            let started = Instant::now();
            let rendered = Value::Object(template::render(&action.parameters, alert));

            let outcome = match self.drivers.get(&action.action_type) {
                Some(driver) => call_with_timeout(driver.as_ref(), rendered, Duration::from_secs(action.timeout_secs)).await,
                None => {
                    warn!(action_type = %action.action_type, "no driver registered for this action type");
                    self.log_run(playbook, alert, action, RunStatus::Error, started.elapsed().as_millis() as u64, Some(format!("no driver registered for '{}'", action.action_type))).await;
                    if action.fail_stop {
                        break;
                    }
                    continue;
                }
            };

            let duration_ms = started.elapsed().as_millis() as u64;
            let stop = match outcome {
                Ok(result) => {
                    self.log_run(playbook, alert, action, RunStatus::Ok, duration_ms, result.detail).await;
                    false
                }
                Err(drivers::DriverError::Timeout(_)) => {
                    self.log_run(playbook, alert, action, RunStatus::Timeout, duration_ms, Some("action timed out".to_string())).await;
                    action.fail_stop
                }
                Err(drivers::DriverError::Failed(message)) => {
                    self.log_run(playbook, alert, action, RunStatus::Error, duration_ms, Some(message)).await;
                    action.fail_stop
                }
            };
            if stop {
                break;
            }
        }
    }

    async fn log_run(&self, playbook: &Playbook, alert: &Alert, action: &PlaybookAction, status: RunStatus, duration_ms: u64, error: Option<String>) {
        let record = PlaybookRunRecord::new(&playbook.id, alert.id, &action.name, status, duration_ms, error);
        if let Err(err) = self.run_log.append(&record).await {
            warn!(playbook_id = %playbook.id, action = %action.name, error = %err, "failed to persist playbook run record");
        } else {
            info!(playbook_id = %playbook.id, action = %action.name, status = ?status, "playbook action completed");
        }
    }
}

fn conditions_hold(conditions: &[ActionCondition], alert: &Alert) -> bool {
    conditions.iter().all(|condition| condition.holds(alert))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bus::InMemoryBus;
    use aegis_domain::entities::{FieldOperator, Severity};
    use async_trait::async_trait;
    use drivers::{ActionOutcome, DriverError};
    use serde_json::{json, Map};
    use sqlx::sqlite::SqlitePoolOptions;
    use uuid::Uuid;

    struct RecordingDriver {
        calls: Arc<parking_lot::Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl ActionDriver for RecordingDriver {
        fn name(&self) -> &'static str {
            "webhook"
        }

        async fn call(&self, rendered: Value) -> Result<ActionOutcome, DriverError> {
            self.calls.lock().push(rendered);
            Ok(ActionOutcome { success: true, detail: None })
        }
    }

    struct FixedPlaybookStore {
        playbooks: Arc<Vec<Playbook>>,
    }

    #[async_trait]
    impl PlaybookStore for FixedPlaybookStore {
        fn snapshot(&self) -> Arc<Vec<Playbook>> {
            self.playbooks.clone()
        }

        async fn reload(&self) -> Result<(), AegisError> {
            Ok(())
        }
    }

    async fn run_log() -> Arc<SqlitePlaybookRunLog> {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let log = SqlitePlaybookRunLog::new(pool);
        log.migrate().await.unwrap();
        Arc::new(log)
    }

    fn sample_alert() -> Alert {
        Alert::raise("rule-1", "Repeated failed logins", Severity::High, "desc", Uuid::new_v4(), json!({ "src_ip": "10.0.0.1" }), vec![]).unwrap()
    }

    #[tokio::test]
    async fn triggered_playbook_runs_its_action() {
        let bus = Arc::new(InMemoryBus::new());
        let consumer: Arc<dyn Consumer> = Arc::new(bus.consumer("alerts").unwrap());
        let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let driver: Arc<dyn ActionDriver> = Arc::new(RecordingDriver { calls: calls.clone() });

        let playbook = Playbook {
            id: "pb-1".into(),
            name: "Contain".into(),
            enabled: true,
            triggers: vec![ActionCondition { field: "rule_id".into(), op: FieldOperator::Equals, value: json!("rule-1") }],
            actions: vec![PlaybookAction { name: "notify".into(), action_type: "webhook".into(), parameters: Map::new(), conditions: vec![], timeout_secs: 5, fail_stop: false }],
        };
        let store: Arc<dyn PlaybookStore> = Arc::new(FixedPlaybookStore { playbooks: Arc::new(vec![playbook]) });
        let runner = PlaybookRunner::new(consumer, store, vec![driver], run_log().await);

        let alert = sample_alert();
        bus.publish("alerts", &alert.rule_id, serde_json::to_vec(&alert).unwrap(), Duration::from_secs(1)).await.unwrap();

        assert!(runner.run_once(Duration::from_secs(1)).await.unwrap());
        assert_eq!(calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn action_with_unmet_condition_is_skipped() {
        let bus = Arc::new(InMemoryBus::new());
        let consumer: Arc<dyn Consumer> = Arc::new(bus.consumer("alerts").unwrap());
        let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let driver: Arc<dyn ActionDriver> = Arc::new(RecordingDriver { calls: calls.clone() });

        let playbook = Playbook {
            id: "pb-1".into(),
            name: "Contain".into(),
            enabled: true,
            triggers: vec![ActionCondition { field: "rule_id".into(), op: FieldOperator::Equals, value: json!("rule-1") }],
            actions: vec![PlaybookAction {
                name: "notify".into(),
                action_type: "webhook".into(),
                parameters: Map::new(),
                conditions: vec![ActionCondition { field: "severity".into(), op: FieldOperator::Equals, value: json!("critical") }],
                timeout_secs: 5,
                fail_stop: false,
            }],
        };
        let store: Arc<dyn PlaybookStore> = Arc::new(FixedPlaybookStore { playbooks: Arc::new(vec![playbook]) });
        let runner = PlaybookRunner::new(consumer, store, vec![driver], run_log().await);

        let alert = sample_alert();
        bus.publish("alerts", &alert.rule_id, serde_json::to_vec(&alert).unwrap(), Duration::from_secs(1)).await.unwrap();

        assert!(runner.run_once(Duration::from_secs(1)).await.unwrap());
        assert_eq!(calls.lock().len(), 0, "severity is 'high', condition requires 'critical'");
    }
}
