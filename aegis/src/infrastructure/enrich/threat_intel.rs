// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::infrastructure::dedup::TtlLruCache;
use aegis_domain::entities::Event;
use aegis_domain::error::AegisError;
use aegis_domain::services::enrich::Enricher;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Looks up a configured indicator-of-compromise field (e.g. `data.src_ip`,
/// `data.file_hash`) against a threat-intel REST API, caching hits and
/// misses per IoC value so the same indicator is not looked up twice
/// within the cache window.
pub struct ThreatIntelEnricher {
    client: Client,
    base_url: String,
    field: String,
    ioc_type: &'static str,
    seen: TtlLruCache,
    results: RwLock<HashMap<String, Value>>,
}

impl ThreatIntelEnricher {
    pub fn new(base_url: impl Into<String>, field: impl Into<String>, ioc_type: &'static str, cache_ttl: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            field: field.into(),
            ioc_type,
            seen: TtlLruCache::new(10_000, cache_ttl),
            results: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Enricher for ThreatIntelEnricher {
    fn name(&self) -> &'static str {
        "threat_intel"
    }

    async fn enrich(&self, event: &mut Event) -> Result<(), AegisError> {
        let Some(value) = event.get_path(&self.field) else { return Ok(()) };
        let Some(indicator) = value.as_str() else { return Ok(()) };

        if self.seen.check_and_insert(indicator) {
            if let Some(cached) = self.results.read().get(indicator) {
                event.enrich("threat_intel", cached.clone());
            }
            return Ok(());
        }

        let url = format!("{}/indicators/{}/{indicator}", self.base_url, self.ioc_type);
        let response = self.client.get(&url).send().await.map_err(|e| AegisError::internal(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(AegisError::internal(format!("threat intel lookup returned {}", response.status())));
        }
        let body: Value = response.json().await.map_err(|e| AegisError::internal(e.to_string()))?;
        self.results.write().insert(indicator.to_string(), body.clone());
        event.enrich("threat_intel", body);
        Ok(())
    }
}
