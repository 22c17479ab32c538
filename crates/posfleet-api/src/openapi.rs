//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "posfleet API",
        version = "0.1.0",
        description = "Payment-terminal registry and provisioning pipeline: device custody, activations, exchanges, retrievals and logistics requests."
    ),
    paths(
        // Devices
        crate::routes::devices::list_devices,
        crate::routes::devices::register_device,
        crate::routes::devices::get_device,
        crate::routes::devices::transition_device,
        crate::routes::devices::remove_device,
        // Tasks
        crate::routes::tasks::list_tasks,
        crate::routes::tasks::get_task,
        crate::routes::tasks::open_activation,
        crate::routes::tasks::open_sales_request,
        crate::routes::tasks::open_material_request,
        crate::routes::tasks::open_shipment_request,
        crate::routes::tasks::mark_ready,
        crate::routes::tasks::issue_provisioning,
        crate::routes::tasks::queue_shipment,
        crate::routes::tasks::complete_task,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::devices::DeviceResponse,
        crate::routes::devices::HistoryEntryResponse,
        crate::routes::devices::RegisterDeviceRequest,
        crate::routes::devices::TransitionDeviceRequest,
        crate::routes::tasks::TaskResponse,
        crate::routes::tasks::DeviceBindingBody,
        crate::routes::tasks::RegistrationBody,
        crate::routes::tasks::TransitionRecordResponse,
        crate::routes::tasks::OpenActivationRequest,
        crate::routes::tasks::OpenSalesRequest,
        crate::routes::tasks::OpenLogisticsRequest,
        crate::routes::tasks::ProvisioningRequest,
    )),
    tags(
        (name = "devices", description = "Device registry and custody"),
        (name = "tasks", description = "Provisioning pipeline"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
