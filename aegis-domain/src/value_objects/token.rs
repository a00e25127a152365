// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// The claims bound into a signed bearer token: the issuing username, the
/// granted scopes at mint time, the caller's client IP, and an expiry.
/// Tokens are revocable only via expiry — there is no revocation list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub username: String,
    pub scopes: BTreeSet<String>,
    pub client_ip: IpAddr,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn new(username: impl Into<String>, scopes: BTreeSet<String>, client_ip: IpAddr, ttl_minutes: i64) -> Self {
        Self { username: username.into(), scopes, client_ip, expires_at: Utc::now() + chrono::Duration::minutes(ttl_minutes) }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn has_scope(&self, required: &str) -> bool {
        self.scopes.contains(required)
    }
}

/// A minted bearer token: the opaque signed string plus the claims it
/// decodes to, returned from `/token` and reconstructed by `verify()`.
#[derive(Debug, Clone)]
pub struct BearerToken {
    pub access_token: String,
    pub claims: Claims,
}

impl BearerToken {
    pub fn expires_in_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.claims.expires_at - now).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn expiry_is_strictly_in_the_future_on_mint() {
        let claims = Claims::new("alice", BTreeSet::from(["logs:write".to_string()]), IpAddr::V4(Ipv4Addr::LOCALHOST), 30);
        assert!(!claims.is_expired(Utc::now()));
        assert!(claims.is_expired(Utc::now() + chrono::Duration::minutes(31)));
    }

    #[test]
    fn scope_containment() {
        let claims = Claims::new("alice", BTreeSet::from(["logs:write".to_string()]), IpAddr::V4(Ipv4Addr::LOCALHOST), 30);
        assert!(claims.has_scope("logs:write"));
        assert!(!claims.has_scope("logs:admin"));
    }
}
