//! # Device Registry API
//!
//! Warehouse intake, custody queries, manual moves and decommission.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use posfleet_core::{AssetTag, SerialNumber};
use posfleet_provisioning::{DeviceFilter, RegisterDevice};
use posfleet_state::{Device, DeviceStatus, HistoryEntry};

use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, Validate};
use crate::state::AppState;

// ── DTOs ────────────────────────────────────────────────────────────────────

/// One custody change, as shown to operators.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntryResponse {
    pub status: String,
    pub holder: String,
    pub description: String,
    pub timestamp: String,
}

impl From<&HistoryEntry> for HistoryEntryResponse {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            status: entry.status.as_str().to_string(),
            holder: entry.holder.clone(),
            description: entry.description.clone(),
            timestamp: entry.timestamp.to_iso8601(),
        }
    }
}

/// A terminal and its history, newest entry first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceResponse {
    pub serial_number: String,
    pub asset_tag: String,
    pub model: String,
    /// One of IN_STOCK, WITH_FIELD_AGENT, ACTIVE, DEFECTIVE, IN_TRANSIT.
    pub status: String,
    pub current_holder: String,
    pub last_updated: String,
    /// Whether the unit can be bound to a new task.
    pub available: bool,
    pub history: Vec<HistoryEntryResponse>,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> Self {
        Self {
            serial_number: device.serial_number().to_string(),
            asset_tag: device.asset_tag().to_string(),
            model: device.model().to_string(),
            status: device.status().as_str().to_string(),
            current_holder: device.current_holder().to_string(),
            last_updated: device.last_updated().to_iso8601(),
            available: device.is_available(),
            history: device
                .history_newest_first()
                .map(HistoryEntryResponse::from)
                .collect(),
        }
    }
}

/// Warehouse intake form.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterDeviceRequest {
    pub serial_number: String,
    pub asset_tag: String,
    #[serde(default)]
    pub model: String,
    /// Initial status. Defaults to IN_STOCK.
    pub status: Option<String>,
    /// Initial holder. Defaults to the configured warehouse.
    pub holder: Option<String>,
}

impl Validate for RegisterDeviceRequest {
    fn validate(&self) -> Result<(), String> {
        if self.serial_number.trim().is_empty() {
            return Err("serial_number must not be empty".into());
        }
        if self.asset_tag.trim().is_empty() {
            return Err("asset_tag must not be empty".into());
        }
        if self.model.len() > 255 {
            return Err("model must not exceed 255 characters".into());
        }
        Ok(())
    }
}

/// Manual custody change.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransitionDeviceRequest {
    pub status: String,
    pub holder: String,
    #[serde(default)]
    pub description: String,
}

impl Validate for TransitionDeviceRequest {
    fn validate(&self) -> Result<(), String> {
        if self.holder.trim().is_empty() {
            return Err("holder must not be empty".into());
        }
        Ok(())
    }
}

/// Device list filters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeviceQuery {
    /// Exact status.
    pub status: Option<String>,
    /// Substring of the current holder.
    pub holder: Option<String>,
    /// Substring of serial number or asset tag.
    pub q: Option<String>,
}

impl DeviceQuery {
    fn into_filter(self) -> Result<DeviceFilter, AppError> {
        let status = self
            .status
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<DeviceStatus>())
            .transpose()?;
        Ok(DeviceFilter {
            status,
            holder: self.holder.filter(|h| !h.trim().is_empty()),
            query: self.q.filter(|q| !q.trim().is_empty()),
        })
    }
}

// ── Router ──────────────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/devices", get(list_devices).post(register_device))
        .route("/v1/devices/{serial}", get(get_device).delete(remove_device))
        .route("/v1/devices/{serial}/transition", post(transition_device))
}

fn parse_serial(raw: &str) -> Result<SerialNumber, AppError> {
    Ok(SerialNumber::new(raw)?)
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// GET /v1/devices
#[utoipa::path(
    get,
    path = "/v1/devices",
    params(DeviceQuery),
    responses(
        (status = 200, description = "Matching devices", body = Vec<DeviceResponse>),
        (status = 422, description = "Unknown status filter", body = crate::error::ErrorBody),
    ),
    tag = "devices"
)]
pub async fn list_devices(
    State(state): State<AppState>,
    query: Result<Query<DeviceQuery>, QueryRejection>,
) -> Result<Json<Vec<DeviceResponse>>, AppError> {
    let filter = extract_query(query)?.into_filter()?;
    let devices = state.fleet.list_devices(&filter)?;
    Ok(Json(devices.into_iter().map(DeviceResponse::from).collect()))
}

/// POST /v1/devices
#[utoipa::path(
    post,
    path = "/v1/devices",
    request_body = RegisterDeviceRequest,
    responses(
        (status = 201, description = "Device registered", body = DeviceResponse),
        (status = 409, description = "Serial already registered", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "devices"
)]
pub async fn register_device(
    State(state): State<AppState>,
    body: Result<Json<RegisterDeviceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DeviceResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let status = match req.status.as_deref() {
        Some(s) => s.parse::<DeviceStatus>()?,
        None => DeviceStatus::InStock,
    };
    let holder = req
        .holder
        .unwrap_or_else(|| state.fleet.config().warehouse_holder.clone());
    let device = state.fleet.register_device(RegisterDevice {
        serial_number: SerialNumber::new(req.serial_number)?,
        asset_tag: AssetTag::new(req.asset_tag)?,
        model: req.model,
        status,
        holder,
    })?;
    Ok((StatusCode::CREATED, Json(device.into())))
}

/// GET /v1/devices/{serial}
#[utoipa::path(
    get,
    path = "/v1/devices/{serial}",
    params(("serial" = String, Path, description = "Device serial number")),
    responses(
        (status = 200, description = "Device found", body = DeviceResponse),
        (status = 404, description = "Not registered", body = crate::error::ErrorBody),
    ),
    tag = "devices"
)]
pub async fn get_device(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> Result<Json<DeviceResponse>, AppError> {
    let device = state.fleet.get_device(&parse_serial(&serial)?)?;
    Ok(Json(device.into()))
}

/// POST /v1/devices/{serial}/transition
#[utoipa::path(
    post,
    path = "/v1/devices/{serial}/transition",
    params(("serial" = String, Path, description = "Device serial number")),
    request_body = TransitionDeviceRequest,
    responses(
        (status = 200, description = "Custody updated", body = DeviceResponse),
        (status = 404, description = "Not registered", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "devices"
)]
pub async fn transition_device(
    State(state): State<AppState>,
    Path(serial): Path<String>,
    body: Result<Json<TransitionDeviceRequest>, JsonRejection>,
) -> Result<Json<DeviceResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let status: DeviceStatus = req.status.parse()?;
    let device = state.fleet.transition_device(
        &parse_serial(&serial)?,
        status,
        &req.holder,
        &req.description,
    )?;
    Ok(Json(device.into()))
}

/// DELETE /v1/devices/{serial}
#[utoipa::path(
    delete,
    path = "/v1/devices/{serial}",
    params(("serial" = String, Path, description = "Device serial number")),
    responses(
        (status = 204, description = "Device removed"),
        (status = 404, description = "Not registered", body = crate::error::ErrorBody),
        (status = 409, description = "Referenced by an open task", body = crate::error::ErrorBody),
    ),
    tag = "devices"
)]
pub async fn remove_device(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> Result<StatusCode, AppError> {
    state.fleet.remove_device(&parse_serial(&serial)?)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parses_status_case_insensitively() {
        let filter = DeviceQuery {
            status: Some("in-stock".into()),
            holder: Some(" ".into()),
            q: Some("SN0".into()),
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.status, Some(DeviceStatus::InStock));
        assert!(filter.holder.is_none());
        assert_eq!(filter.query.as_deref(), Some("SN0"));
    }

    #[test]
    fn test_query_rejects_unknown_status() {
        let err = DeviceQuery {
            status: Some("LOST".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();
        assert!(matches!(err, AppError::Fleet(_)));
    }

    #[test]
    fn test_register_request_validation() {
        let req = RegisterDeviceRequest {
            serial_number: " ".into(),
            asset_tag: "PAT-1".into(),
            model: String::new(),
            status: None,
            holder: None,
        };
        assert!(req.validate().is_err());
    }
}
