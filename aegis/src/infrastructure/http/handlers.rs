// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::infrastructure::http::errors::ApiError;
use crate::infrastructure::http::state::AppState;
use crate::infrastructure::metrics;
use aegis_domain::entities::{EventBatch, NewEvent, RawLogRequest};
use aegis_domain::error::AegisError;
use aegis_domain::value_objects::Claims;
use axum::extract::{ConnectInfo, Form, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;

const LOGS_WRITE_SCOPE: &str = "logs:write";

/// `POST /token` form body: `username`/`password`, per spec.md's
/// form-encoded login contract (not JSON, unlike every other endpoint).
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: i64,
}

pub async fn token(State(state): State<AppState>, ConnectInfo(addr): ConnectInfo<SocketAddr>, Form(form): Form<LoginForm>) -> Result<Response, ApiError> {
    let token = state.auth.authenticate(&form.username, &form.password, addr.ip()).await?;
    let expires_in = token.expires_in_seconds(chrono::Utc::now());
    Ok(Json(TokenResponse { access_token: token.access_token, token_type: "bearer", expires_in }).into_response())
}

pub async fn health(State(state): State<AppState>) -> Response {
    let (bus_status, bus_ok) = match state.bus_health.ping().await {
        Ok(()) => ("healthy", true),
        Err(_) => ("unhealthy", false),
    };
    let (cache_status, cache_ok) = match state.cache_health.ping().await {
        Ok(()) => ("healthy", true),
        Err(_) => ("unhealthy", false),
    };

    let status = if bus_ok && cache_ok { "healthy" } else { "degraded" };
    let body = json!({
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "services": { "bus": bus_status, "cache": cache_status },
    });

    let code = if bus_ok && cache_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(body)).into_response()
}

pub async fn metrics_handler() -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], metrics::render()).into_response()
}

/// Decodes the `Authorization: Bearer <token>` header and verifies it
/// carries `required_scope`, the one check every `/ingest*` handler
/// shares.
async fn authorize(state: &AppState, headers: &HeaderMap, required_scope: &str) -> Result<Claims, ApiError> {
    let header_value = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).ok_or_else(|| AegisError::auth("missing authorization header"))?;
    let token = header_value.strip_prefix("Bearer ").ok_or_else(|| AegisError::auth("authorization header must be a bearer token"))?;
    let claims = state.auth.verify(token).await?;
    if !claims.has_scope(required_scope) {
        return Err(AegisError::scope(required_scope).into());
    }
    Ok(claims)
}

pub async fn ingest(State(state): State<AppState>, headers: HeaderMap, Json(new_event): Json<NewEvent>) -> Result<Response, ApiError> {
    authorize(&state, &headers, LOGS_WRITE_SCOPE).await?;
    let id = state.collector.ingest(new_event).await?;
    Ok((StatusCode::OK, Json(json!({ "id": id, "status": "accepted" }))).into_response())
}

pub async fn ingest_batch(State(state): State<AppState>, headers: HeaderMap, Json(batch): Json<EventBatch>) -> Result<Response, ApiError> {
    authorize(&state, &headers, LOGS_WRITE_SCOPE).await?;
    let result = state.collector.ingest_batch(batch).await;
    Ok((StatusCode::OK, Json(result)).into_response())
}

pub async fn ingest_raw(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<RawLogRequest>) -> Result<Response, ApiError> {
    authorize(&state, &headers, LOGS_WRITE_SCOPE).await?;
    let id = state.collector.ingest_raw(request, chrono::Utc::now()).await?;
    Ok((StatusCode::OK, Json(json!({ "id": id, "status": "accepted" }))).into_response())
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
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> AppState {
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
        AppState::new(collector, auth, request_limiter, batch_limiter, events_limiter, login_limiter, bus, cache_health)
    }

    #[tokio::test]
    async fn ingest_without_authorization_header_is_rejected() {
        let app_state = state();
        let headers = HeaderMap::new();
        let result = authorize(&app_state, &headers, LOGS_WRITE_SCOPE).await;
        assert!(result.is_err());
    }
}
