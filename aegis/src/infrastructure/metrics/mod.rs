// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Prometheus counters and histograms for the pipeline's stages, exposed
//! over `/metrics` by [`crate::infrastructure::http::routes`].

use prometheus::{register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder};
use std::sync::OnceLock;

pub struct PipelineMetrics {
    pub events_ingested_total: IntCounterVec,
    pub events_deduplicated_total: IntCounterVec,
    pub index_writes_total: IntCounterVec,
    pub rule_evaluations_total: IntCounterVec,
    pub alerts_emitted_total: IntCounterVec,
    pub playbook_actions_total: IntCounterVec,
    pub dispatcher_sends_total: IntCounterVec,
    pub processing_duration_seconds: HistogramVec,
}

impl PipelineMetrics {
    fn new() -> Self {
        Self {
            events_ingested_total: register_int_counter_vec!("aegis_events_ingested_total", "Events accepted by the collector", &["source"]).unwrap(),
            events_deduplicated_total: register_int_counter_vec!("aegis_events_deduplicated_total", "Events dropped as duplicates by the processor", &["source"]).unwrap(),
            index_writes_total: register_int_counter_vec!("aegis_index_writes_total", "Index write attempts by outcome", &["outcome"]).unwrap(),
            rule_evaluations_total: register_int_counter_vec!("aegis_rule_evaluations_total", "Detection rule evaluations by outcome", &["rule_id", "outcome"]).unwrap(),
            alerts_emitted_total: register_int_counter_vec!("aegis_alerts_emitted_total", "Alerts raised by severity", &["severity"]).unwrap(),
            playbook_actions_total: register_int_counter_vec!("aegis_playbook_actions_total", "Playbook action executions by status", &["action_type", "status"]).unwrap(),
            dispatcher_sends_total: register_int_counter_vec!("aegis_dispatcher_sends_total", "Alert dispatch attempts by channel and outcome", &["channel", "outcome"]).unwrap(),
            processing_duration_seconds: register_histogram_vec!("aegis_processing_duration_seconds", "Wall-clock time spent per pipeline stage", &["stage"]).unwrap(),
        }
    }
}

static METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

pub fn metrics() -> &'static PipelineMetrics {
    METRICS.get_or_init(PipelineMetrics::new)
}

/// Renders the default registry in Prometheus text exposition format,
/// the body of the `/metrics` endpoint.
pub fn render() -> String {
    let _ = metrics();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).ok();
    String::from_utf8(buffer).unwrap_or_default()
}
