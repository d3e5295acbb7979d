// SPDX-License-Identifier: BUSL-1.1
//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from ztm-ca, ztm-trust, etc. to HTTP status codes.
//! Returns JSON error response bodies with error code and message.
//! Never exposes internal error details in responses.
//!
//! Certificate verification failures are deliberately NOT mapped here:
//! on the evaluation path they surface as `Deny` decisions with reason
//! codes, never as transport errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API
/// surface.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
///
/// Maps domain errors to appropriate HTTP status codes and structured
/// JSON error bodies. Internal error details are never exposed to clients.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed or contains invalid values (422).
    /// The client sent syntactically valid HTTP but semantically invalid
    /// content; only malformed HTTP framing is 400.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication failure — missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned
    /// to the client.
    #[error("internal error: {0}")]
    Internal(String),

    /// Service dependency not available (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for
    /// this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        // Log server-side errors for operator visibility.
        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Convert certificate authority errors to API errors.
///
/// Lifecycle violations (wrong state for the requested transition) are
/// conflicts; unknown identities and serials are 404s; verification
/// failures reaching this path directly (issue/rotate, not evaluate)
/// are conflicts with the current certificate state.
impl From<ztm_ca::CaError> for AppError {
    fn from(err: ztm_ca::CaError) -> Self {
        use ztm_ca::CaError;
        match &err {
            CaError::IdentityUnknown(_) | CaError::UnknownSerial(_) => {
                Self::NotFound(err.to_string())
            }
            CaError::InvalidValidity(_) => Self::Validation(err.to_string()),
            CaError::InvalidTransition { .. }
            | CaError::NotYetValid(_)
            | CaError::Expired { .. }
            | CaError::Revoked { .. }
            | CaError::Superseded(_)
            | CaError::NotActivated(_)
            | CaError::BadSignature(_) => Self::Conflict(err.to_string()),
            CaError::KeyProvider(_) | CaError::Encoding(_) => Self::Internal(err.to_string()),
        }
    }
}

/// Convert telemetry ingestion errors to API errors.
impl From<ztm_monitor::MonitorError> for AppError {
    fn from(err: ztm_monitor::MonitorError) -> Self {
        match &err {
            ztm_monitor::MonitorError::InvalidEvent(_) => Self::Validation(err.to_string()),
            ztm_monitor::MonitorError::ShuttingDown => Self::ServiceUnavailable(err.to_string()),
        }
    }
}

/// Convert trust scoring errors to API errors.
impl From<ztm_trust::TrustError> for AppError {
    fn from(err: ztm_trust::TrustError) -> Self {
        // Version conflicts and commit contention are transient races on
        // the shared store; the client can simply retry.
        Self::Conflict(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_status_code() {
        let err = AppError::NotFound("missing principal".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn validation_status_code() {
        let err = AppError::Validation("bad field".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn bad_request_status_code() {
        let err = AppError::BadRequest("malformed JSON".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn unauthorized_status_code() {
        let err = AppError::Unauthorized("no token".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "UNAUTHORIZED");
    }

    #[test]
    fn conflict_status_code() {
        let err = AppError::Conflict("certificate already active".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "CONFLICT");
    }

    #[test]
    fn ca_unknown_serial_maps_to_not_found() {
        let err = AppError::from(ztm_ca::CaError::UnknownSerial(ztm_core::CertSerial::new()));
        let (status, _) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn ca_invalid_transition_maps_to_conflict() {
        let err = AppError::from(ztm_ca::CaError::InvalidTransition {
            serial: ztm_core::CertSerial::new(),
            from: ztm_ca::CertState::Revoked.to_string(),
            to: ztm_ca::CertState::Active.to_string(),
        });
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "CONFLICT");
    }

    #[test]
    fn monitor_invalid_event_maps_to_validation() {
        let err = AppError::from(ztm_monitor::MonitorError::InvalidEvent(
            "empty feature vector".to_string(),
        ));
        let (status, _) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    // ── into_response tests ──────────────────────────────────────

    use http_body_util::BodyExt;

    /// Helper to extract status and body from a Response.
    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn into_response_not_found() {
        let (status, body) = response_parts(AppError::NotFound("principal 123".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("principal 123"));
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        // The internal error message must NOT appear in the response body.
        assert!(
            !body.error.message.contains("db connection"),
            "internal error details must not leak: {}",
            body.error.message
        );
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn into_response_conflict() {
        let (status, body) = response_parts(AppError::Conflict("already revoked".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "CONFLICT");
        assert!(body.error.message.contains("already revoked"));
    }
}
