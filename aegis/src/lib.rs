// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Aegis Application
//!
//! Wires the `aegis-domain` ports to concrete infrastructure and exposes the
//! application layer's use cases: ingesting and normalizing logs, evaluating
//! detection rules, and running response playbooks.
//!
//! ## Module Structure
//!
//! - [`application`] — use cases: the Collector, Processor, Detection
//!   Engine, Response Engine, and Alert Dispatcher. Depends only on
//!   `aegis_domain` traits, never on a concrete adapter.
//! - [`infrastructure`] — adapters implementing those traits: HTTP
//!   (`axum`), the message bus (`rdkafka` / in-memory), the search index
//!   (Elasticsearch-shaped REST / in-memory), auth and rate limiting
//!   (`jsonwebtoken`, `argon2`, Redis / in-memory), log parsers, and the
//!   `sqlx`-backed stores.
//! - [`presentation`] — the `clap`-based CLI surface.

pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use infrastructure::config::AegisConfig;
