// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::Event;
use aegis_domain::repositories::{IndexError, LifecyclePolicy};
use aegis_domain::value_objects::IndexKey;
use aegis_domain::IndexClient;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Talks to Elasticsearch's document and `_template` REST surface
/// directly rather than through the official client crate — the
/// pipeline only needs three calls (`PUT` a document, a field-equality
/// `_search`, and `_index_template`), not a full query DSL binding.
pub struct EsIndexClient {
    client: Client,
    base_url: String,
}

impl EsIndexClient {
    pub fn new(hosts: Vec<String>, username: Option<String>, password: Option<String>, verify_ssl: bool) -> Result<Self, IndexError> {
        let base_url = hosts.into_iter().next().ok_or_else(|| IndexError::Unavailable("no elasticsearch hosts configured".to_string()))?;
        let mut builder = Client::builder().danger_accept_invalid_certs(!verify_ssl);
        if let (Some(user), Some(pass)) = (username, password) {
            let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, format!("{user}:{pass}"));
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(&format!("Basic {encoded}"))
                .map_err(|e| IndexError::Unavailable(e.to_string()))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }
        let client = builder.build().map_err(|e| IndexError::Unavailable(e.to_string()))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl IndexClient for EsIndexClient {
    async fn put(&self, prefix: &str, key: IndexKey, event: &Event) -> Result<(), IndexError> {
        let index_name = key.index_name(prefix);
        let url = format!("{}/{index_name}/_doc/{}", self.base_url, event.id);
        let response = self.client.put(&url).json(event).send().await.map_err(|e| IndexError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IndexError::Rejected(format!("elasticsearch returned {}", response.status())));
        }
        Ok(())
    }

    async fn search(&self, prefix: &str, key: IndexKey, field: &str, value: &Value, limit: usize) -> Result<Vec<Event>, IndexError> {
        let index_name = key.index_name(prefix);
        let url = format!("{}/{index_name}/_search", self.base_url);
        let body = json!({
            "size": limit,
            "sort": [{ "timestamp": "desc" }],
            "query": { "term": { field: value } },
        });
        let response = self.client.post(&url).json(&body).send().await.map_err(|e| IndexError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IndexError::Rejected(format!("elasticsearch returned {}", response.status())));
        }
        let parsed: Value = response.json().await.map_err(|e| IndexError::Unavailable(e.to_string()))?;
        let hits = parsed["hits"]["hits"].as_array().cloned().unwrap_or_default();
        hits.into_iter()
            .map(|hit| serde_json::from_value(hit["_source"].clone()).map_err(|e| IndexError::Rejected(e.to_string())))
            .collect()
    }

    async fn ensure_template(&self, prefix: &str, policy: LifecyclePolicy) -> Result<(), IndexError> {
        let url = format!("{}/_index_template/{prefix}-template", self.base_url);
        let body = json!({
            "index_patterns": [format!("{prefix}-*")],
            "template": {
                "settings": {
                    "index.lifecycle.name": format!("{prefix}-policy"),
                },
                "mappings": {
                    "properties": {
                        "id": { "type": "keyword" },
                        "source": { "type": "keyword" },
                        "event_type": { "type": "keyword" },
                        "timestamp": { "type": "date" },
                    }
                }
            },
            "_meta": {
                "warm_after_days": policy.warm_after_days,
                "cold_after_days": policy.cold_after_days,
                "delete_after_days": policy.delete_after_days,
            }
        });
        let response = self.client.put(&url).json(&body).send().await.map_err(|e| IndexError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IndexError::Rejected(format!("elasticsearch returned {}", response.status())));
        }
        Ok(())
    }
}
