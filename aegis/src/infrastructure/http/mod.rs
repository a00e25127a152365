// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Collector HTTP surface: `axum` router, handlers, middleware, and the
//! `AegisError` → response mapping.

mod errors;
mod handlers;
mod middleware;
mod routes;
mod state;

pub use middleware::RateLimitQuota;
pub use routes::build_router;
pub use state::AppState;
