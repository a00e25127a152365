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
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-process index for tests and local runs, keyed the same way the
/// Elasticsearch adapter addresses documents: `(index_name, event.id)`.
#[derive(Default)]
pub struct InMemoryIndexClient {
    documents: RwLock<HashMap<String, Event>>,
}

impl InMemoryIndexClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IndexClient for InMemoryIndexClient {
    async fn put(&self, prefix: &str, key: IndexKey, event: &Event) -> Result<(), IndexError> {
        let doc_id = format!("{}:{}", key.index_name(prefix), event.id);
        self.documents.write().insert(doc_id, event.clone());
        Ok(())
    }

    async fn search(&self, prefix: &str, key: IndexKey, field: &str, value: &serde_json::Value, limit: usize) -> Result<Vec<Event>, IndexError> {
        let index_name = key.index_name(prefix);
        let documents = self.documents.read();
        let mut matches: Vec<Event> = documents
            .iter()
            .filter(|(doc_id, _)| doc_id.starts_with(&format!("{index_name}:")))
            .filter_map(|(_, event)| (event.get_path(field).as_ref() == Some(value)).then(|| event.clone()))
            .collect();
        matches.sort_by_key(|event| std::cmp::Reverse(event.timestamp));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn ensure_template(&self, _prefix: &str, _policy: LifecyclePolicy) -> Result<(), IndexError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain::entities::NewEvent;
    use serde_json::{json, Map};

    fn sample_event(src_ip: &str) -> Event {
        let mut data = Map::new();
        data.insert("src_ip".to_string(), json!(src_ip));
        Event::accept(NewEvent { source: "firewall".into(), event_type: "deny".into(), timestamp: None, data }).unwrap()
    }

    #[tokio::test]
    async fn put_then_search_finds_matching_field() {
        let client = InMemoryIndexClient::new();
        let event = sample_event("10.0.0.1");
        let key = IndexKey::from_timestamp(event.timestamp);
        client.put("logs", key, &event).await.unwrap();

        let found = client.search("logs", key, "data.src_ip", &json!("10.0.0.1"), 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, event.id);
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let client = InMemoryIndexClient::new();
        for _ in 0..5 {
            let event = sample_event("10.0.0.1");
            let key = IndexKey::from_timestamp(event.timestamp);
            client.put("logs", key, &event).await.unwrap();
        }
        let key = IndexKey::from_timestamp(chrono::Utc::now());
        let found = client.search("logs", key, "data.src_ip", &json!("10.0.0.1"), 2).await.unwrap();
        assert_eq!(found.len(), 2);
    }
}
