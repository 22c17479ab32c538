//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Fleet errors keep their own machine-readable code; everything else uses
//! a generic one. Storage failures are logged and never echoed to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use posfleet_core::FleetError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "DEVICE_ALREADY_BOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for some client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A rule of the fleet rejected the command.
    #[error(transparent)]
    Fleet(#[from] FleetError),

    /// Request body or query could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request parsed but failed validation (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A dependency of the service is not configured (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Fleet(err) => (fleet_status(err), err.code()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Fleet(FleetError::Storage(_)))
    }
}

fn fleet_status(err: &FleetError) -> StatusCode {
    match err {
        FleetError::UnknownSerial { .. } | FleetError::UnknownTask { .. } => StatusCode::NOT_FOUND,
        FleetError::DuplicateSerial { .. }
        | FleetError::DeviceInUse { .. }
        | FleetError::DeviceAlreadyBound { .. }
        | FleetError::DeviceUnavailable { .. }
        | FleetError::InvalidTransition { .. }
        | FleetError::PartialExchangeFailure { .. } => StatusCode::CONFLICT,
        FleetError::IncompleteProvisioningData { .. }
        | FleetError::UnresolvedRelease { .. }
        | FleetError::UnknownReason { .. }
        | FleetError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FleetError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if self.is_internal() {
            tracing::error!(error = %self, "internal server error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let details = match &self {
            Self::Fleet(FleetError::IncompleteProvisioningData { missing }) => {
                Some(serde_json::json!({ "missing": missing }))
            }
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}
