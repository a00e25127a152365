// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Repositories (Ports)
//!
//! Trait boundaries between the domain and the outside world: the message
//! bus ([`bus`]), the search/storage index ([`index`]), the hot-reloadable
//! rule and playbook stores ([`rule_store`], [`playbook_store`]), the
//! rate limiter ([`rate_limiter`]), failed-login tracking
//! ([`login_attempts`]), and dependency liveness ([`health`]). Concrete
//! adapters live in the `aegis` application crate's `infrastructure`
//! module.

pub mod bus;
pub mod health;
pub mod index;
pub mod login_attempts;
pub mod playbook_store;
pub mod rate_limiter;
pub mod rule_store;

pub use bus::{Ack, BusError, BusRecord, Consumer, MessageBus};
pub use health::HealthCheck;
pub use index::{IndexClient, IndexError, LifecyclePolicy};
pub use login_attempts::LoginAttemptTracker;
pub use playbook_store::PlaybookStore;
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use rule_store::{RuleSnapshot, RuleStore};
