// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Rate limiting adapters for [`aegis_domain::repositories::RateLimiter`]:
//! a Redis-backed sliding-window log for production and an in-memory
//! equivalent for tests. Also hosts the parallel
//! [`aegis_domain::repositories::LoginAttemptTracker`] adapters, since
//! both are cache-backed counters keyed by a string.

mod inmem;
mod login_attempts_inmem;
mod login_attempts_redis;
mod redis_limiter;

pub use inmem::InMemoryRateLimiter;
pub use login_attempts_inmem::InMemoryLoginAttemptTracker;
pub use login_attempts_redis::RedisLoginAttemptTracker;
pub use redis_limiter::RedisRateLimiter;
