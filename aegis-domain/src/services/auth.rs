// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::entities::User;
use crate::error::AegisError;
use crate::value_objects::BearerToken;
use async_trait::async_trait;
use std::net::IpAddr;

/// Verifies a plaintext credential against a stored hash and mints a
/// bearer token scoped to the authenticated user. Implementations live in
/// the `aegis` application crate (`infrastructure::auth`); this trait is
/// the domain-facing seam so `User`/`Claims` stay independent of the
/// specific hashing and signing libraries used underneath.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Authenticates `username`/`password` and, on success, mints a
    /// token carrying `user`'s scopes and `client_ip`.
    async fn authenticate(&self, username: &str, password: &str, client_ip: IpAddr) -> Result<BearerToken, AegisError>;

    /// Verifies an opaque access token string, returning the claims it
    /// decodes to if the signature is valid and it has not expired.
    async fn verify(&self, access_token: &str) -> Result<crate::value_objects::Claims, AegisError>;
}

/// Looks up users by username. Separated from [`AuthService`] so stores
/// (SQLite-backed in production, in-memory for tests) can be swapped
/// independently of the signing/hashing strategy.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AegisError>;
}
