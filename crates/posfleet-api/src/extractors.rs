//! # Custom Extractors & Validation
//!
//! The [`Validate`] trait for request DTOs, helpers to extract and
//! validate JSON bodies and query strings, and the [`RequesterContext`]
//! extractor that reads who is acting from the session headers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::Json;

use posfleet_state::{Requester, RequesterRole};

use crate::error::AppError;

/// Header carrying the acting user's display name.
pub const REQUESTER_NAME_HEADER: &str = "x-requester-name";
/// Header carrying the acting user's role.
pub const REQUESTER_ROLE_HEADER: &str = "x-requester-role";

/// Request types that check business rules beyond what serde checks.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and run its [`Validate`] rules.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Extract a query string, mapping parse errors to [`AppError::BadRequest`].
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// The person acting on a request, as asserted by the session layer in
/// front of this service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterContext(pub Requester);

impl<S: Send + Sync> FromRequestParts<S> for RequesterContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let name = header(REQUESTER_NAME_HEADER)
            .ok_or_else(|| AppError::BadRequest("missing X-Requester-Name header".into()))?;
        let role: RequesterRole = header(REQUESTER_ROLE_HEADER)
            .ok_or_else(|| AppError::BadRequest("missing X-Requester-Role header".into()))?
            .parse()
            .map_err(|e: posfleet_core::FleetError| AppError::BadRequest(e.to_string()))?;
        Ok(Self(Requester {
            name: name.to_string(),
            role,
        }))
    }
}
