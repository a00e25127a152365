// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::application::collector::CollectorService;
use aegis_domain::repositories::HealthCheck;
use aegis_domain::services::auth::AuthService;
use aegis_domain::RateLimiter;
use std::sync::Arc;

/// Everything a handler needs, cloned cheaply (every field is an `Arc`)
/// onto each request by axum's `State` extractor. `/ingest`, `/ingest/batch`,
/// and `/ingest/raw` each carry their own rate limiter so a burst against
/// one doesn't starve the quota of the other two.
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<CollectorService>,
    pub auth: Arc<dyn AuthService>,
    pub request_rate_limiter: Arc<dyn RateLimiter>,
    pub batch_rate_limiter: Arc<dyn RateLimiter>,
    pub events_rate_limiter: Arc<dyn RateLimiter>,
    pub login_rate_limiter: Arc<dyn RateLimiter>,
    pub bus_health: Arc<dyn HealthCheck>,
    pub cache_health: Arc<dyn HealthCheck>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        collector: Arc<CollectorService>,
        auth: Arc<dyn AuthService>,
        request_rate_limiter: Arc<dyn RateLimiter>,
        batch_rate_limiter: Arc<dyn RateLimiter>,
        events_rate_limiter: Arc<dyn RateLimiter>,
        login_rate_limiter: Arc<dyn RateLimiter>,
        bus_health: Arc<dyn HealthCheck>,
        cache_health: Arc<dyn HealthCheck>,
    ) -> Self {
        Self { collector, auth, request_rate_limiter, batch_rate_limiter, events_rate_limiter, login_rate_limiter, bus_health, cache_health }
    }
}
