// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::infrastructure::http::middleware::{self, RateLimitQuota};
use crate::infrastructure::http::{handlers, AppState};
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Router};

/// Wires every route in spec.md §6's table plus the ambient `/metrics`
/// endpoint. `/token`, `/ingest`, `/ingest/batch`, and `/ingest/raw` each
/// carry their own rate-limit middleware instance and quota (`login`,
/// `request`, `batch`, `events` respectively).
#[allow(clippy::too_many_arguments)]
pub fn build_router(
    state: AppState,
    cors_allowlist: &[String],
    request_timeout_secs: u64,
    login_quota: RateLimitQuota,
    request_quota: RateLimitQuota,
    batch_quota: RateLimitQuota,
    events_quota: RateLimitQuota,
) -> Router {
    let login_limiter = state.login_rate_limiter.clone();
    let request_limiter = state.request_rate_limiter.clone();
    let batch_limiter = state.batch_rate_limiter.clone();
    let events_limiter = state.events_rate_limiter.clone();

    let token_routes = Router::new().route("/token", post(handlers::token)).layer(axum_middleware::from_fn(move |req, next| {
        let limiter = login_limiter.clone();
        async move { middleware::rate_limit_by_ip(limiter, login_quota, req, next).await }
    }));

    let ingest_route = Router::new().route("/ingest", post(handlers::ingest)).layer(axum_middleware::from_fn(move |req, next| {
        let limiter = request_limiter.clone();
        async move { middleware::rate_limit_by_ip(limiter, request_quota, req, next).await }
    }));

    let ingest_batch_route = Router::new().route("/ingest/batch", post(handlers::ingest_batch)).layer(axum_middleware::from_fn(move |req, next| {
        let limiter = batch_limiter.clone();
        async move { middleware::rate_limit_by_ip(limiter, batch_quota, req, next).await }
    }));

    let ingest_raw_route = Router::new().route("/ingest/raw", post(handlers::ingest_raw)).layer(axum_middleware::from_fn(move |req, next| {
        let limiter = events_limiter.clone();
        async move { middleware::rate_limit_by_ip(limiter, events_quota, req, next).await }
    }));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_handler))
        .merge(token_routes)
        .merge(ingest_route)
        .merge(ingest_batch_route)
        .merge(ingest_raw_route)
        .layer(middleware::cors_layer(cors_allowlist))
        .layer(middleware::trace_layer())
        .layer(middleware::timeout_layer(request_timeout_secs))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::collector::CollectorService;
    use crate::infrastructure::auth::{InMemoryUserStore, JwtAuthService};
    use crate::infrastructure::bus::InMemoryBus;
    use crate::infrastructure::parsers::default_parsers;
    use crate::infrastructure::rate_limit::{InMemoryLoginAttemptTracker, InMemoryRateLimiter};
    use aegis_domain::repositories::Consumer;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn router() -> Router {
        let bus = Arc::new(InMemoryBus::new());
        let _consumer = bus.consumer("raw_logs").unwrap();
        let collector = Arc::new(CollectorService::new(bus.clone(), "raw_logs", Duration::from_secs(1), default_parsers()));
        let users = Arc::new(InMemoryUserStore::new());
        let auth = Arc::new(JwtAuthService::new("test-secret", 30, users, Arc::new(InMemoryLoginAttemptTracker::new())));
        let request_limiter = Arc::new(InMemoryRateLimiter::new(100, 60));
        let batch_limiter = Arc::new(InMemoryRateLimiter::new(100, 60));
        let events_limiter = Arc::new(InMemoryRateLimiter::new(100, 60));
        let login_limiter = Arc::new(InMemoryRateLimiter::new(5, 60));
        let cache_health = Arc::new(InMemoryRateLimiter::new(100, 60));
        let state = AppState::new(collector, auth, request_limiter, batch_limiter, events_limiter, login_limiter, bus, cache_health);
        let quota = RateLimitQuota { times: 100, window_seconds: 60 };
        build_router(state, &[], 30, quota, quota, quota, quota)
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok_when_dependencies_are_up() {
        let response = router().oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ingest_without_a_token_is_unauthorized() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"source":"firewall","event_type":"deny"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_prometheus_text() {
        let response = router().oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
