// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::Event;
use aegis_domain::error::AegisError;
use aegis_domain::services::enrich::Enricher;
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Attaches `enriched.rdns` (the PTR hostname) for the first configured
/// field holding a parseable IP address. Successful lookups are cached
/// for at least an hour — PTR records rarely change and a SIEM pipeline
/// re-sees the same small set of IPs constantly.
pub struct ReverseDnsEnricher {
    resolver: TokioAsyncResolver,
    fields: Vec<String>,
    cache: Arc<Mutex<HashMap<IpAddr, (String, Instant)>>>,
    cache_ttl: Duration,
}

impl ReverseDnsEnricher {
    pub fn new(fields: Vec<String>, cache_ttl: Duration) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
            fields,
            cache: Arc::new(Mutex::new(HashMap::new())),
            cache_ttl,
        }
    }

    fn cached(&self, ip: &IpAddr) -> Option<String> {
        let cache = self.cache.lock();
        cache.get(ip).filter(|(_, at)| at.elapsed() < self.cache_ttl).map(|(name, _)| name.clone())
    }
}

#[async_trait]
impl Enricher for ReverseDnsEnricher {
    fn name(&self) -> &'static str {
        "rdns"
    }

    async fn enrich(&self, event: &mut Event) -> Result<(), AegisError> {
        for field in &self.fields {
            let Some(value) = event.get_path(field) else { continue };
            let Some(ip_str) = value.as_str() else { continue };
            let Ok(ip) = ip_str.parse::<IpAddr>() else { continue };

            if let Some(hostname) = self.cached(&ip) {
                event.enrich("rdns", serde_json::json!({ "field": field, "hostname": hostname }));
                return Ok(());
            }

            let lookup = self.resolver.reverse_lookup(ip).await.map_err(|e| AegisError::internal(e.to_string()))?;
            let Some(name) = lookup.iter().next() else { continue };
            let hostname = name.to_string();
            self.cache.lock().insert(ip, (hostname.clone(), Instant::now()));
            event.enrich("rdns", serde_json::json!({ "field": field, "hostname": hostname }));
            return Ok(());
        }
        Ok(())
    }
}
