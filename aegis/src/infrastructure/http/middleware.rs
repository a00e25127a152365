// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Request-scoped middleware: rate-limit header injection (grounded on
//! the rate-limit middleware shape other media-server examples in the
//! pack wire in front of their API routers) plus the CORS/trace/timeout
//! stack every route shares.

use crate::infrastructure::http::errors::ApiError;
use aegis_domain::error::AegisError;
use aegis_domain::RateLimiter;
use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// The quota a [`rate_limit_by_ip`] instance enforces, reported back in
/// `X-RateLimit-Limit` regardless of the decision.
#[derive(Clone, Copy)]
pub struct RateLimitQuota {
    pub times: u32,
    pub window_seconds: u64,
}

/// Checks `limiter` against the caller's IP and, on rejection, short
/// circuits with 429 plus `Retry-After`/`X-RateLimit-*` headers; on
/// success, stamps the same headers onto the eventual response so every
/// caller can see their quota even before they exhaust it.
pub async fn rate_limit_by_ip(
    limiter: Arc<dyn RateLimiter>,
    quota: RateLimitQuota,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let decision = limiter.check(&ip).await;
    match decision {
        aegis_domain::repositories::RateLimitDecision::Reject { retry_after_secs } => {
            Err(ApiError(AegisError::rate_limit("rate limit exceeded", retry_after_secs)))
        }
        aegis_domain::repositories::RateLimitDecision::Allow { remaining } => {
            let mut response = next.run(req).await;
            insert_rate_limit_headers(&mut response, quota, remaining);
            Ok(response)
        }
    }
}

fn insert_rate_limit_headers(response: &mut Response, quota: RateLimitQuota, remaining: u32) {
    let headers = response.headers_mut();
    if let Ok(limit) = HeaderValue::from_str(&quota.times.to_string()) {
        headers.insert("x-ratelimit-limit", limit);
    }
    if let Ok(reset) = HeaderValue::from_str(&quota.window_seconds.to_string()) {
        headers.insert("x-ratelimit-reset", reset);
    }
    if let Ok(remaining) = HeaderValue::from_str(&remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", remaining);
    }
}

/// Default cross-cutting layers applied to the whole router: permissive
/// CORS (narrowed via `cors_allowlist` when configured), request tracing,
/// and a blanket request timeout so a stalled downstream dependency can't
/// hang a collector worker forever.
pub fn cors_layer(allowlist: &[String]) -> CorsLayer {
    if allowlist.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = allowlist.iter().filter_map(|origin| HeaderValue::from_str(origin).ok()).collect();
        CorsLayer::new().allow_origin(origins).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
    }
}

pub fn trace_layer() -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

pub fn timeout_layer(seconds: u64) -> TimeoutLayer {
    TimeoutLayer::new(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_cors_when_allowlist_is_empty() {
        let _layer = cors_layer(&[]);
    }

    #[test]
    fn restricted_cors_when_allowlist_is_set() {
        let _layer = cors_layer(&["https://console.example.com".to_string()]);
    }
}
