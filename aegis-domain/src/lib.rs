// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Aegis Domain
//!
//! The domain layer represents the core business logic and rules of the log
//! ingestion and detection pipeline. It implements Domain-Driven Design (DDD)
//! patterns and is independent of external concerns like message brokers,
//! search indices, or HTTP frameworks — those live one layer up, in the
//! `aegis` application crate, behind the ports declared here.
//!
//! ## Module Structure
//!
//! ### Entities
//! Objects with a distinct identity that persists through state changes:
//! [`entities::Event`], [`entities::User`], [`entities::DetectionRule`],
//! [`entities::Alert`], [`entities::Playbook`].
//!
//! ### Value Objects
//! Immutable, self-validating objects with no identity:
//! [`value_objects::Fingerprint`], [`value_objects::IndexKey`],
//! [`value_objects::BearerToken`].
//!
//! ### Domain Services
//! Stateless operations that don't belong to a single entity:
//! [`services::parser`] (the log parser library), [`services::auth`],
//! [`services::enrich`].
//!
//! ### Repositories / Ports
//! Abstractions over external collaborators, implemented by adapters in the
//! `aegis` crate: [`repositories::bus`], [`repositories::index`],
//! [`repositories::rule_store`], [`repositories::playbook_store`],
//! [`repositories::rate_limiter`], and [`services::auth`]'s `UserStore`.
//!
//! ## Business Rules and Invariants
//!
//! - An [`entities::Event`]'s `enriched` map is append-only and is never
//!   populated by anything other than the Processor's enrichment step.
//! - An [`entities::Alert`] is emitted at most once per `(rule_id,
//!   fingerprint)` pair within a rule's throttle window.
//! - [`entities::Playbook`] actions execute in declaration order; a failed
//!   action does not stop subsequent actions unless it declares
//!   `fail_stop`.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use entities::{Alert, DetectionRule, Event, EventBatch, Playbook, User};
pub use error::AegisError;
pub use repositories::{IndexClient, MessageBus, PlaybookStore, RateLimiter, RuleStore};
pub use value_objects::{BearerToken, Fingerprint, IndexKey};
