// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A stable hash over an event's `(source, event_type, canonicalized data
/// subset)`, used both for Processor deduplication and for Detection's
/// per-`(rule_id, fingerprint)` alert throttling.
///
/// The subset of `data` hashed excludes volatile fields (`timestamp`,
/// request IDs) so that two submissions of "the same" event produce the
/// same fingerprint even if they carry different wall-clock timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

/// Fields excluded from the canonicalized subset because they are
/// expected to vary between otherwise-identical submissions.
const VOLATILE_FIELDS: &[&str] = &["timestamp", "request_id", "requestId"];

impl Fingerprint {
    /// Computes the fingerprint for `(source, event_type, data)`.
    ///
    /// `data` is canonicalized by sorting object keys (via
    /// `serde_json::Value`'s `BTreeMap`-backed `Map` ordering is not
    /// guaranteed, so keys are collected and sorted explicitly) and
    /// dropping [`VOLATILE_FIELDS`] before hashing.
    pub fn compute(source: &str, event_type: &str, data: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(b"\0");
        hasher.update(event_type.as_bytes());
        hasher.update(b"\0");

        let mut keys: Vec<&String> = data.keys().filter(|k| !VOLATILE_FIELDS.contains(&k.as_str())).collect();
        keys.sort();
        for key in keys {
            let value = &data[key];
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(canonical_value_bytes(value).as_bytes());
            hasher.update(b"\0");
        }

        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Deterministic, order-stable textual form of a JSON value for hashing.
/// `serde_json::Value::to_string()` does not guarantee key order for
/// nested objects, so nested objects are recursively canonicalized too.
fn canonical_value_bytes(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = String::from("{");
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(k);
                out.push(':');
                out.push_str(&canonical_value_bytes(&map[*k]));
            }
            out.push('}');
            out
        }
        serde_json::Value::Array(items) => {
            let mut out = String::from("[");
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&canonical_value_bytes(v));
            }
            out.push(']');
            out
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn same_fields_same_fingerprint() {
        let a = obj(json!({ "src_ip": "10.0.0.1", "attempts": 5 }));
        let b = obj(json!({ "attempts": 5, "src_ip": "10.0.0.1" }));
        assert_eq!(Fingerprint::compute("firewall", "login", &a), Fingerprint::compute("firewall", "login", &b));
    }

    #[test]
    fn volatile_fields_do_not_affect_fingerprint() {
        let a = obj(json!({ "src_ip": "10.0.0.1", "timestamp": "2026-01-01T00:00:00Z" }));
        let b = obj(json!({ "src_ip": "10.0.0.1", "timestamp": "2026-07-27T12:00:00Z" }));
        assert_eq!(Fingerprint::compute("firewall", "login", &a), Fingerprint::compute("firewall", "login", &b));
    }

    #[test]
    fn different_source_different_fingerprint() {
        let a = obj(json!({ "src_ip": "10.0.0.1" }));
        assert_ne!(Fingerprint::compute("firewall", "login", &a), Fingerprint::compute("vpn", "login", &a));
    }
}
