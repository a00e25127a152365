// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! JWT-backed [`aegis_domain::services::auth::AuthService`] and the two
//! [`aegis_domain::services::auth::UserStore`] implementations.

mod jwt;
mod user_store_inmem;
mod user_store_sqlite;

pub use jwt::{hash_password, JwtAuthService};
pub use user_store_inmem::InMemoryUserStore;
pub use user_store_sqlite::SqliteUserStore;
