//! # Provisioning Pipeline API
//!
//! Opening tasks from registration approvals, sales requests and logistics
//! requests, and driving them through ready → provisioning → shipment →
//! completion. The acting user comes from the requester headers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use posfleet_core::{AssetTag, SerialNumber, TaskId, Timestamp};
use posfleet_provisioning::{LogisticsRequest, RegistrationApproval, SalesRequest, TaskFilter};
use posfleet_state::{
    DeviceBinding, ProvisioningInput, RegistrationDetails, Task, TaskKind, TaskState,
    TaskTransitionRecord,
};

use crate::error::AppError;
use crate::extractors::{
    extract_json, extract_query, extract_validated_json, RequesterContext, Validate,
};
use crate::state::AppState;

// ── Response DTOs ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceBindingBody {
    pub serial_number: String,
    pub asset_tag: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegistrationBody {
    #[serde(default)]
    pub document_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub plan: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransitionRecordResponse {
    pub from_state: String,
    pub to_state: String,
    pub timestamp: String,
    pub note: String,
}

impl From<&TaskTransitionRecord> for TransitionRecordResponse {
    fn from(r: &TaskTransitionRecord) -> Self {
        Self {
            from_state: r.from_state.as_str().to_string(),
            to_state: r.to_state.as_str().to_string(),
            timestamp: r.timestamp.to_iso8601(),
            note: r.note.clone(),
        }
    }
}

/// A task as shown on the provisioning board.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskResponse {
    pub id: Uuid,
    /// NEW_ACTIVATION, EXCHANGE, RETRIEVAL, MATERIAL_REQUEST or SHIPMENT_REQUEST.
    pub kind: String,
    pub state: String,
    pub client_name: String,
    pub requester_name: String,
    pub requester_role: String,
    pub created_at: String,
    pub updated_at: String,
    pub device_binding: Option<DeviceBindingBody>,
    pub release_serial: Option<String>,
    pub provisioning_code: Option<String>,
    pub reason_code: Option<String>,
    pub registration: Option<RegistrationBody>,
    pub details: String,
    pub transitions: Vec<TransitionRecordResponse>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: *task.id().as_uuid(),
            kind: task.kind().as_str().to_string(),
            state: task.state().as_str().to_string(),
            client_name: task.client_name().to_string(),
            requester_name: task.requester().name.clone(),
            requester_role: task.requester().role.as_str().to_string(),
            created_at: task.created_at().to_iso8601(),
            updated_at: task.updated_at().to_iso8601(),
            device_binding: task.device_binding().map(|b| DeviceBindingBody {
                serial_number: b.serial_number.to_string(),
                asset_tag: b.asset_tag.to_string(),
            }),
            release_serial: task.release_binding().map(ToString::to_string),
            provisioning_code: task.provisioning_code().map(str::to_string),
            reason_code: task.reason_code().map(str::to_string),
            registration: task.registration().map(|r| RegistrationBody {
                document_number: r.document_number.clone(),
                address: r.address.clone(),
                plan: r.plan.clone(),
            }),
            details: task.details().to_string(),
            transitions: task
                .transitions()
                .iter()
                .map(TransitionRecordResponse::from)
                .collect(),
        }
    }
}

// ── Request DTOs ────────────────────────────────────────────────────────────

/// An approved merchant registration.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenActivationRequest {
    pub client_name: String,
    #[serde(default)]
    pub document_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub plan: String,
    /// A unit already chosen during registration.
    pub device_binding: Option<DeviceBindingBody>,
    #[serde(default)]
    pub details: String,
}

impl Validate for OpenActivationRequest {
    fn validate(&self) -> Result<(), String> {
        if self.client_name.trim().is_empty() {
            return Err("client_name must not be empty".into());
        }
        Ok(())
    }
}

/// An exchange or retrieval request against an installed unit.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenSalesRequest {
    /// EXCHANGE or RETRIEVAL.
    pub kind: String,
    pub client_name: String,
    pub release_serial: String,
    pub reason_code: String,
    #[serde(default)]
    pub details: String,
}

impl Validate for OpenSalesRequest {
    fn validate(&self) -> Result<(), String> {
        if self.client_name.trim().is_empty() {
            return Err("client_name must not be empty".into());
        }
        if self.reason_code.trim().is_empty() {
            return Err("reason_code must not be empty".into());
        }
        Ok(())
    }
}

/// A material or shipment request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenLogisticsRequest {
    pub client_name: String,
    #[serde(default)]
    pub details: String,
}

impl Validate for OpenLogisticsRequest {
    fn validate(&self) -> Result<(), String> {
        if self.client_name.trim().is_empty() {
            return Err("client_name must not be empty".into());
        }
        Ok(())
    }
}

/// Provisioning form. Blank fields fall back to a binding made earlier.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProvisioningRequest {
    pub serial_number: Option<String>,
    pub asset_tag: Option<String>,
    pub provisioning_code: Option<String>,
}

/// Task list filters. Dates accept RFC 3339 or `YYYY-MM-DD`; a bare `to`
/// date includes the whole day.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskQuery {
    pub kind: Option<String>,
    pub state: Option<String>,
    /// Substring of the client name.
    pub client: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

impl TaskQuery {
    fn into_filter(self) -> Result<TaskFilter, AppError> {
        Ok(TaskFilter {
            kind: non_blank(self.kind)
                .map(|k| k.parse::<TaskKind>())
                .transpose()?,
            state: non_blank(self.state)
                .map(|s| s.parse::<TaskState>())
                .transpose()?,
            client: non_blank(self.client),
            created_from: non_blank(self.from)
                .map(|d| Timestamp::parse_lenient(&d))
                .transpose()?,
            created_to: non_blank(self.to)
                .map(|d| Timestamp::parse_lenient_end(&d))
                .transpose()?,
        })
    }
}

fn binding(body: DeviceBindingBody) -> Result<DeviceBinding, AppError> {
    Ok(DeviceBinding {
        serial_number: SerialNumber::new(body.serial_number)?,
        asset_tag: AssetTag::new(body.asset_tag)?,
    })
}

// ── Router ──────────────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/tasks", get(list_tasks))
        .route("/v1/tasks/activations", post(open_activation))
        .route("/v1/tasks/sales-requests", post(open_sales_request))
        .route("/v1/tasks/material-requests", post(open_material_request))
        .route("/v1/tasks/shipment-requests", post(open_shipment_request))
        .route("/v1/tasks/{id}", get(get_task))
        .route("/v1/tasks/{id}/ready", post(mark_ready))
        .route("/v1/tasks/{id}/provisioning", post(issue_provisioning))
        .route("/v1/tasks/{id}/shipment", post(queue_shipment))
        .route("/v1/tasks/{id}/complete", post(complete_task))
}

// ── Queries ─────────────────────────────────────────────────────────────────

/// GET /v1/tasks
#[utoipa::path(
    get,
    path = "/v1/tasks",
    params(TaskQuery),
    responses(
        (status = 200, description = "Matching tasks, newest first", body = Vec<TaskResponse>),
        (status = 422, description = "Bad filter", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    query: Result<Query<TaskQuery>, QueryRejection>,
) -> Result<Json<Vec<TaskResponse>>, AppError> {
    let filter = extract_query(query)?.into_filter()?;
    let tasks = state.fleet.list_tasks(&filter);
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// GET /v1/tasks/{id}
#[utoipa::path(
    get,
    path = "/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = TaskResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, AppError> {
    Ok(Json(state.fleet.get_task(TaskId(id))?.into()))
}

// ── Task creation ───────────────────────────────────────────────────────────

/// POST /v1/tasks/activations
#[utoipa::path(
    post,
    path = "/v1/tasks/activations",
    request_body = OpenActivationRequest,
    params(
        ("X-Requester-Name" = String, Header, description = "Acting user"),
        ("X-Requester-Role" = String, Header, description = "FIELD_AGENT, INSIDE_SALES, LOGISTICS or ADMIN"),
    ),
    responses(
        (status = 201, description = "Activation opened", body = TaskResponse),
        (status = 409, description = "Chosen unit is unavailable or bound", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn open_activation(
    State(state): State<AppState>,
    RequesterContext(requester): RequesterContext,
    body: Result<Json<OpenActivationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let approval = RegistrationApproval {
        client_name: req.client_name,
        registration: RegistrationDetails {
            document_number: req.document_number,
            address: req.address,
            plan: req.plan,
        },
        device_binding: req.device_binding.map(binding).transpose()?,
        details: req.details,
    };
    let task = state.fleet.open_activation(approval, requester)?;
    Ok((StatusCode::CREATED, Json(task.into())))
}

/// POST /v1/tasks/sales-requests
#[utoipa::path(
    post,
    path = "/v1/tasks/sales-requests",
    request_body = OpenSalesRequest,
    params(
        ("X-Requester-Name" = String, Header, description = "Acting user"),
        ("X-Requester-Role" = String, Header, description = "FIELD_AGENT, INSIDE_SALES, LOGISTICS or ADMIN"),
    ),
    responses(
        (status = 201, description = "Request opened", body = TaskResponse),
        (status = 409, description = "Release unit already bound", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown reason or release unit", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn open_sales_request(
    State(state): State<AppState>,
    RequesterContext(requester): RequesterContext,
    body: Result<Json<OpenSalesRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let request = SalesRequest {
        kind: req.kind.parse()?,
        client_name: req.client_name,
        release_serial: SerialNumber::new(req.release_serial)?,
        reason_code: req.reason_code,
        details: req.details,
    };
    let task = state.fleet.open_sales_request(request, requester)?;
    Ok((StatusCode::CREATED, Json(task.into())))
}

async fn open_logistics(
    state: AppState,
    kind: TaskKind,
    requester: RequesterContext,
    body: Result<Json<OpenLogisticsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let task = state.fleet.open_logistics_request(
        kind,
        LogisticsRequest {
            client_name: req.client_name,
            details: req.details,
        },
        requester.0,
    )?;
    Ok((StatusCode::CREATED, Json(task.into())))
}

/// POST /v1/tasks/material-requests
#[utoipa::path(
    post,
    path = "/v1/tasks/material-requests",
    request_body = OpenLogisticsRequest,
    responses(
        (status = 201, description = "Material request opened", body = TaskResponse),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn open_material_request(
    State(state): State<AppState>,
    requester: RequesterContext,
    body: Result<Json<OpenLogisticsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskResponse>), AppError> {
    open_logistics(state, TaskKind::MaterialRequest, requester, body).await
}

/// POST /v1/tasks/shipment-requests
#[utoipa::path(
    post,
    path = "/v1/tasks/shipment-requests",
    request_body = OpenLogisticsRequest,
    responses(
        (status = 201, description = "Shipment request opened", body = TaskResponse),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn open_shipment_request(
    State(state): State<AppState>,
    requester: RequesterContext,
    body: Result<Json<OpenLogisticsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskResponse>), AppError> {
    open_logistics(state, TaskKind::ShipmentRequest, requester, body).await
}

// ── Operator actions ────────────────────────────────────────────────────────

/// POST /v1/tasks/{id}/ready
#[utoipa::path(
    post,
    path = "/v1/tasks/{id}/ready",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Ready for provisioning", body = TaskResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Illegal transition", body = crate::error::ErrorBody),
        (status = 422, description = "Release unit unresolved", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn mark_ready(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, AppError> {
    Ok(Json(state.fleet.mark_ready(TaskId(id))?.into()))
}

/// POST /v1/tasks/{id}/provisioning
#[utoipa::path(
    post,
    path = "/v1/tasks/{id}/provisioning",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = ProvisioningRequest,
    responses(
        (status = 200, description = "Provisioning issued", body = TaskResponse),
        (status = 404, description = "Unknown task or serial", body = crate::error::ErrorBody),
        (status = 409, description = "Unit bound, unavailable, or illegal transition", body = crate::error::ErrorBody),
        (status = 422, description = "Missing provisioning data", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn issue_provisioning(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<ProvisioningRequest>, JsonRejection>,
) -> Result<Json<TaskResponse>, AppError> {
    let req = extract_json(body)?;
    let input = ProvisioningInput {
        serial_number: req.serial_number,
        asset_tag: req.asset_tag,
        provisioning_code: req.provisioning_code,
    };
    Ok(Json(state.fleet.issue_provisioning(TaskId(id), &input)?.into()))
}

/// POST /v1/tasks/{id}/shipment
#[utoipa::path(
    post,
    path = "/v1/tasks/{id}/shipment",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Queued for shipment", body = TaskResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Illegal transition", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn queue_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, AppError> {
    Ok(Json(state.fleet.queue_shipment(TaskId(id))?.into()))
}

/// POST /v1/tasks/{id}/complete
#[utoipa::path(
    post,
    path = "/v1/tasks/{id}/complete",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task completed", body = TaskResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Illegal transition or partial exchange", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn complete_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, AppError> {
    Ok(Json(state.fleet.complete(TaskId(id))?.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_accepts_plain_dates() {
        let filter = TaskQuery {
            kind: Some("exchange".into()),
            state: Some("otp-issued".into()),
            client: Some("beta".into()),
            from: Some("2026-01-01".into()),
            to: None,
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.kind, Some(TaskKind::Exchange));
        assert_eq!(filter.state, Some(TaskState::OtpIssued));
        assert!(filter.created_from.is_some());
        assert!(filter.created_to.is_none());
    }

    #[test]
    fn test_query_plain_to_date_includes_whole_day() {
        let filter = TaskQuery {
            from: Some("2026-10-16".into()),
            to: Some("2026-10-16".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.created_from.unwrap().to_iso8601(), "2026-10-16T00:00:00Z");
        assert_eq!(filter.created_to.unwrap().to_iso8601(), "2026-10-16T23:59:59Z");
    }

    #[test]
    fn test_query_rejects_garbage_dates() {
        let err = TaskQuery {
            from: Some("last tuesday".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();
        assert!(matches!(err, AppError::Fleet(_)));
    }

    #[test]
    fn test_sales_request_requires_reason() {
        let req = OpenSalesRequest {
            kind: "EXCHANGE".into(),
            client_name: "Oficina Beta".into(),
            release_serial: "SN003".into(),
            reason_code: "  ".into(),
            details: String::new(),
        };
        assert!(req.validate().unwrap_err().contains("reason_code"));
    }
}
