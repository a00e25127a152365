// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::error::AegisError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Maps each [`AegisError`] category to the status code and JSON body
/// the collector's HTTP surface is documented to return. `RateLimit`
/// additionally carries a `Retry-After` header.
pub struct ApiError(pub AegisError);

impl From<AegisError> for ApiError {
    fn from(err: AegisError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AegisError::Validation(_) => StatusCode::BAD_REQUEST,
            AegisError::Auth(_) => StatusCode::UNAUTHORIZED,
            AegisError::Scope(_) => StatusCode::FORBIDDEN,
            AegisError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            AegisError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AegisError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "status": "error",
            "error": self.0.code(),
            "message": self.0.to_string(),
        }));

        let mut response = (status, body).into_response();
        if let AegisError::RateLimit { retry_after_secs, .. } = &self.0 {
            if let Ok(value) = header::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let response = ApiError(AegisError::validation("bad field")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limit_carries_retry_after_header() {
        let response = ApiError(AegisError::rate_limit("too many", 7)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "7");
    }

    #[test]
    fn upstream_unavailable_maps_to_service_unavailable() {
        let response = ApiError(AegisError::upstream_unavailable("bus down")).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
