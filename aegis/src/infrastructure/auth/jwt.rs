// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::error::AegisError;
use aegis_domain::repositories::LoginAttemptTracker;
use aegis_domain::services::auth::{AuthService, UserStore};
use aegis_domain::value_objects::{BearerToken, Claims};
use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// The JWT wire representation of [`Claims`]. `jsonwebtoken` expects
/// numeric `exp` and doesn't know about `BTreeSet`/`IpAddr` field
/// conventions the way `Claims` is modeled, so this is a thin, explicit
/// bridge rather than deriving `Claims` directly against the JWT crate.
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    username: String,
    scopes: Vec<String>,
    client_ip: String,
    exp: i64,
}

impl From<&Claims> for JwtClaims {
    fn from(claims: &Claims) -> Self {
        Self {
            username: claims.username.clone(),
            scopes: claims.scopes.iter().cloned().collect(),
            client_ip: claims.client_ip.to_string(),
            exp: claims.expires_at.timestamp(),
        }
    }
}

impl TryFrom<JwtClaims> for Claims {
    type Error = AegisError;

    fn try_from(jwt: JwtClaims) -> Result<Self, Self::Error> {
        let client_ip: IpAddr = jwt.client_ip.parse().map_err(|_| AegisError::auth("invalid client_ip in token"))?;
        let expires_at = chrono::DateTime::from_timestamp(jwt.exp, 0).ok_or_else(|| AegisError::auth("invalid exp in token"))?;
        Ok(Claims { username: jwt.username, scopes: jwt.scopes.into_iter().collect(), client_ip, expires_at })
    }
}

/// Failed logins within this window lock the account out (spec contract:
/// five failures within fifteen minutes).
const MAX_FAILED_ATTEMPTS: u32 = 5;
const LOCKOUT_WINDOW_SECONDS: u64 = 15 * 60;

/// A valid Argon2id hash of no real password, hashed once at first use so
/// an unknown username still pays the cost of a verification attempt —
/// otherwise a timing difference between "user not found" and "wrong
/// password" would let an attacker enumerate usernames.
fn dummy_password_hash() -> &'static str {
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$l4z0N1R/W0u8sP5Qz7t8e9v3p4r6n7m8o1q2w3e4r5t"
}

pub struct JwtAuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_minutes: i64,
    users: Arc<dyn UserStore>,
    attempts: Arc<dyn LoginAttemptTracker>,
}

impl JwtAuthService {
    pub fn new(secret: &str, ttl_minutes: i64, users: Arc<dyn UserStore>, attempts: Arc<dyn LoginAttemptTracker>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl_minutes,
            users,
            attempts,
        }
    }
}

#[async_trait]
impl AuthService for JwtAuthService {
    async fn authenticate(&self, username: &str, password: &str, client_ip: IpAddr) -> Result<BearerToken, AegisError> {
        if self.attempts.failure_count(username).await? >= MAX_FAILED_ATTEMPTS {
            return Err(AegisError::rate_limit("too many failed login attempts, try again later", LOCKOUT_WINDOW_SECONDS));
        }

        let user = self.users.find_by_username(username).await?;
        let credential_hash = user.as_ref().map(|u| u.credential_hash.as_str()).unwrap_or_else(dummy_password_hash);
        let parsed_hash = PasswordHash::new(credential_hash).map_err(|_| AegisError::internal("stored credential hash is malformed"))?;
        let password_ok = Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok();

        let user = match (user, password_ok) {
            (Some(user), true) if user.can_authenticate() => user,
            (Some(_), true) => return Err(AegisError::auth("account disabled")),
            _ => {
                self.attempts.record_failure(username, LOCKOUT_WINDOW_SECONDS).await?;
                return Err(AegisError::auth("invalid username or password"));
            }
        };
        self.attempts.clear(username).await?;

        let claims = Claims::new(user.username.clone(), user.scopes.clone(), client_ip, self.ttl_minutes);
        let jwt_claims = JwtClaims::from(&claims);
        let access_token = encode(&Header::new(Algorithm::HS256), &jwt_claims, &self.encoding_key).map_err(|e| AegisError::internal(format!("token signing failed: {e}")))?;

        Ok(BearerToken { access_token, claims })
    }

    async fn verify(&self, access_token: &str) -> Result<Claims, AegisError> {
        let token_data = decode::<JwtClaims>(access_token, &self.decoding_key, &self.validation).map_err(|_| AegisError::auth("invalid or expired token"))?;
        let claims: Claims = token_data.claims.try_into()?;
        if claims.is_expired(chrono::Utc::now()) {
            return Err(AegisError::auth("token expired"));
        }
        Ok(claims)
    }
}

/// Hashes a plaintext password with Argon2id, for use when provisioning
/// users (CLI / migrations), not on the request hot path.
pub fn hash_password(password: &str) -> Result<String, AegisError> {
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default().hash_password(password.as_bytes(), &salt).map(|h| h.to_string()).map_err(|e| AegisError::internal(format!("password hashing failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::rate_limit::InMemoryLoginAttemptTracker;
    use aegis_domain::entities::User;
    use std::collections::BTreeSet;
    use std::net::Ipv4Addr;

    struct FixedUserStore(User);

    #[async_trait]
    impl UserStore for FixedUserStore {
        async fn find_by_username(&self, username: &str) -> Result<Option<User>, AegisError> {
            Ok(if username == self.0.username { Some(self.0.clone()) } else { None })
        }
    }

    fn service(user: User) -> JwtAuthService {
        JwtAuthService::new("test-secret", 30, Arc::new(FixedUserStore(user)), Arc::new(InMemoryLoginAttemptTracker::new()))
    }

    #[tokio::test]
    async fn authenticate_then_verify_round_trips_claims() {
        let hash = hash_password("correct horse").unwrap();
        let user = User::new("alice", BTreeSet::from(["logs:write".to_string()]), hash);
        let service = service(user);

        let token = service.authenticate("alice", "correct horse", IpAddr::V4(Ipv4Addr::LOCALHOST)).await.unwrap();
        let claims = service.verify(&token.access_token).await.unwrap();
        assert_eq!(claims.username, "alice");
        assert!(claims.has_scope("logs:write"));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let hash = hash_password("correct horse").unwrap();
        let user = User::new("alice", BTreeSet::new(), hash);
        let service = service(user);
        let result = service.authenticate("alice", "wrong", IpAddr::V4(Ipv4Addr::LOCALHOST)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn account_is_locked_out_after_five_failures() {
        let hash = hash_password("correct horse").unwrap();
        let user = User::new("alice", BTreeSet::new(), hash);
        let service = service(user);
        for _ in 0..5 {
            let _ = service.authenticate("alice", "wrong", IpAddr::V4(Ipv4Addr::LOCALHOST)).await;
        }
        let result = service.authenticate("alice", "correct horse", IpAddr::V4(Ipv4Addr::LOCALHOST)).await;
        assert!(matches!(result, Err(AegisError::RateLimit { .. })));
    }

    #[tokio::test]
    async fn successful_login_clears_prior_failures() {
        let hash = hash_password("correct horse").unwrap();
        let user = User::new("alice", BTreeSet::new(), hash);
        let service = service(user);
        for _ in 0..3 {
            let _ = service.authenticate("alice", "wrong", IpAddr::V4(Ipv4Addr::LOCALHOST)).await;
        }
        service.authenticate("alice", "correct horse", IpAddr::V4(Ipv4Addr::LOCALHOST)).await.unwrap();
        for _ in 0..3 {
            let _ = service.authenticate("alice", "wrong", IpAddr::V4(Ipv4Addr::LOCALHOST)).await;
        }
        let result = service.authenticate("alice", "correct horse", IpAddr::V4(Ipv4Addr::LOCALHOST)).await;
        assert!(result.is_ok());
    }
}
