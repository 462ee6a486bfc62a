//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each
//! variant maps to the HTTP status and JSON body shape of the public
//! API contract:
//!
//! | Variant | HTTP Status | Body |
//! |---|---|---|
//! | `InvalidRequest` | 400 | `{"error": …}` |
//! | `Unauthorized` | 401 | `{"error": "Unauthorized"}` |
//! | `InsufficientCredits` | 402 | `{"error": …, "required": n, "available": n}` |
//! | `NotFound` | 404 | `{"error": …}` |
//! | `GenerationFailed` | 500 | `{"success": false, "error": …}` |
//! | `UploadFailed` | 500 | `{"success": false, "error": …}` |
//! | `Persistence` | 500 | `{"error": …}` |
//! | `Internal` | 500 | `{"error": …}` |
//!
//! `GenerationFailed` and `UploadFailed` occur only after credits have
//! been reserved; the orchestrator refunds the reservation before either
//! of them reaches a caller, and their bodies carry the
//! `{"success": false}` marker of the render endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// `required`/`available` are present only on insufficient-credit
/// responses; `success` is present (and `false`) only on render-pipeline
/// failures that occurred after credits had been reserved.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// `false` on post-reservation render failures, absent otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Human-readable error message.
    pub error: String,
    /// Credits the rejected operation would have cost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<i64>,
    /// Credits currently available to the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,
}

/// Server-side error enum with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed. No side effects have occurred.
    #[error("{0}")]
    InvalidRequest(String),

    /// No caller identity could be resolved.
    #[error("Unauthorized")]
    Unauthorized,

    /// Balance check failed; nothing was debited.
    #[error("Insufficient credits")]
    InsufficientCredits {
        /// Credits the operation would have cost.
        required: i64,
        /// Credits currently on the account.
        available: i64,
    },

    /// Requested entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The external generation call failed or returned unusable output.
    /// Reserved credits have been refunded by the time this surfaces.
    #[error("{0}")]
    GenerationFailed(String),

    /// Artifact persistence failed. Reserved credits have been refunded
    /// by the time this surfaces.
    #[error("{0}")]
    UploadFailed(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::GenerationFailed(_)
            | Self::UploadFailed(_)
            | Self::Persistence(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds the JSON body for this variant.
    #[must_use]
    pub fn body(&self) -> ErrorResponse {
        let (success, required, available) = match self {
            Self::InsufficientCredits {
                required,
                available,
            } => (None, Some(*required), Some(*available)),
            Self::GenerationFailed(_) | Self::UploadFailed(_) => (Some(false), None, None),
            _ => (None, None, None),
        };
        ErrorResponse {
            success,
            error: self.to_string(),
            required,
            available,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = axum::Json(self.body()).into_response();
        *response.status_mut() = status;
        response
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            GatewayError::InvalidRequest("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::InsufficientCredits {
                required: 128,
                available: 10
            }
            .status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            GatewayError::NotFound("render".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::GenerationFailed("provider timeout".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn insufficient_credits_body_carries_amounts() {
        let err = GatewayError::InsufficientCredits {
            required: 128,
            available: 10,
        };
        let body = err.body();
        assert_eq!(body.error, "Insufficient credits");
        assert_eq!(body.required, Some(128));
        assert_eq!(body.available, Some(10));
        assert_eq!(body.success, None);
    }

    #[test]
    fn post_reservation_failures_mark_success_false() {
        let body = GatewayError::GenerationFailed("provider timeout".into()).body();
        assert_eq!(body.success, Some(false));
        assert_eq!(body.error, "provider timeout");

        let body = GatewayError::UploadFailed("storage write failed".into()).body();
        assert_eq!(body.success, Some(false));
    }

    #[test]
    fn validation_body_is_plain_error() {
        let body = GatewayError::InvalidRequest("Missing required fields".into()).body();
        let json = serde_json::to_value(&body).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        assert_eq!(json, serde_json::json!({"error": "Missing required fields"}));
    }
}
