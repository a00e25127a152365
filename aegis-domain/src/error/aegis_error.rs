// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use thiserror::Error;

/// The error taxonomy for the ingest–process–detect–respond pipeline.
///
/// Each variant maps to exactly one of the six categories the collector's
/// HTTP layer is required to surface: validation, auth, scope, rate-limit,
/// upstream-unavailable, internal.
#[derive(Debug, Error, Clone)]
pub enum AegisError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("missing required scope: {0}")]
    Scope(String),

    #[error("rate limit exceeded: {0}")]
    RateLimit { message: String, retry_after_secs: u64 },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AegisError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn scope(required: impl Into<String>) -> Self {
        Self::Scope(required.into())
    }

    pub fn rate_limit(msg: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::RateLimit { message: msg.into(), retry_after_secs }
    }

    pub fn upstream_unavailable(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Error code string used in the JSON error body (`{"error": ...}`).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Auth(_) => "auth_error",
            Self::Scope(_) => "scope_error",
            Self::RateLimit { .. } => "rate_limit_error",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// True for failures a caller can usefully retry (rate limit,
    /// upstream unavailability); false for everything else.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::UpstreamUnavailable(_))
    }
}

impl From<std::io::Error> for AegisError {
    fn from(err: std::io::Error) -> Self {
        AegisError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AegisError {
    fn from(err: serde_json::Error) -> Self {
        AegisError::Validation(format!("json: {err}"))
    }
}

impl From<serde_yaml::Error> for AegisError {
    fn from(err: serde_yaml::Error) -> Self {
        AegisError::Validation(format!("yaml: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_categories() {
        assert!(AegisError::rate_limit("too many", 5).is_recoverable());
        assert!(AegisError::upstream_unavailable("bus down").is_recoverable());
        assert!(!AegisError::validation("bad field").is_recoverable());
        assert!(!AegisError::internal("boom").is_recoverable());
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(AegisError::auth("expired").code(), "auth_error");
        assert_eq!(AegisError::scope("logs:write").code(), "scope_error");
    }
}
