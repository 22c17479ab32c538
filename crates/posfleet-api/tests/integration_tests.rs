//! # Integration Tests for posfleet-api
//!
//! Drives the provisioning scenarios end to end over HTTP: activation with
//! a provisioning code, double binding, exchange completion and removal of
//! a unit in use. Also covers probes, auth, error bodies, OpenAPI and the
//! metrics endpoint.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;

use posfleet_api::state::{AppConfig, AppState};
use posfleet_provisioning::{Fleet, FleetConfig};

fn test_app() -> Router {
    posfleet_api::app(AppState::new())
}

fn test_app_with_auth(token: &str) -> Router {
    let config = AppConfig {
        auth_token: Some(token.to_string()),
        ..Default::default()
    };
    posfleet_api::app(AppState::with_config(Fleet::new(FleetConfig::default()), config))
}

async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("X-Requester-Name", "Ana Souza")
        .header("X-Requester-Role", "FIELD_AGENT")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let text = body_string(response).await;
    let json = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap()
    };
    (status, json)
}

async fn register(app: &Router, serial: &str, status: &str, holder: &str) {
    let (code, _) = send(
        app,
        post(
            "/v1/devices",
            json!({
                "serial_number": serial,
                "asset_tag": format!("PAT-{serial}"),
                "model": "S920",
                "status": status,
                "holder": holder,
            }),
        ),
    )
    .await;
    assert_eq!(code, StatusCode::CREATED);
}

async fn open_activation(app: &Router, client: &str, binding: Option<&str>) -> (StatusCode, Value) {
    let mut body = json!({ "client_name": client, "document_number": "12.345.678/0001-90" });
    if let Some(serial) = binding {
        body["device_binding"] = json!({ "serial_number": serial, "asset_tag": format!("PAT-{serial}") });
    }
    send(app, post("/v1/tasks/activations", body)).await
}

fn task_uri(task: &Value, action: &str) -> String {
    format!("/v1/tasks/{}/{action}", task["id"].as_str().unwrap())
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let response = test_app().oneshot(get("/health/liveness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let response = test_app().oneshot(get("/health/readiness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_auth_guards_v1_but_not_probes() {
    let app = test_app_with_auth("s3cret");

    let response = app.clone().oneshot(get("/v1/devices")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.clone().oneshot(get("/health/liveness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .uri("/v1/devices")
        .header("Authorization", "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_task_creation_requires_requester_headers() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/tasks/activations")
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "client_name": "Oficina Alfa" }).to_string()))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// -- Device registry ----------------------------------------------------------

#[tokio::test]
async fn test_register_defaults_to_warehouse_stock() {
    let app = test_app();
    let (status, body) = send(
        &app,
        post("/v1/devices", json!({ "serial_number": "SN100", "asset_tag": "PAT-100" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "IN_STOCK");
    assert_eq!(body["current_holder"], "Central Warehouse");
    assert_eq!(body["available"], true);
    assert_eq!(body["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_serial_conflicts() {
    let app = test_app();
    register(&app, "SN100", "IN_STOCK", "Central Warehouse").await;
    let (status, body) = send(
        &app,
        post("/v1/devices", json!({ "serial_number": "SN100", "asset_tag": "PAT-X" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE_SERIAL");
}

#[tokio::test]
async fn test_unknown_device_is_404() {
    let (status, body) = send(&test_app(), get("/v1/devices/NOPE")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "UNKNOWN_SERIAL");
}

#[tokio::test]
async fn test_manual_transition_appends_history_newest_first() {
    let app = test_app();
    register(&app, "SN200", "IN_STOCK", "Central Warehouse").await;
    let (status, body) = send(
        &app,
        post(
            "/v1/devices/SN200/transition",
            json!({ "status": "with_field_agent", "holder": "Carlos", "description": "route 7" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "WITH_FIELD_AGENT");
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["holder"], "Carlos");
    assert_eq!(history[1]["description"], "warehouse intake");
}

#[tokio::test]
async fn test_list_devices_filters() {
    let app = test_app();
    register(&app, "SN301", "IN_STOCK", "Central Warehouse").await;
    register(&app, "SN302", "ACTIVE", "Oficina Beta").await;

    let (_, body) = send(&app, get("/v1/devices?status=ACTIVE")).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["serial_number"], "SN302");

    let (_, body) = send(&app, get("/v1/devices?holder=warehouse")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(&app, get("/v1/devices?status=LOST")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

// -- Scenario A: activation with provisioning code ----------------------------

#[tokio::test]
async fn test_activation_requires_code_then_activates_device() {
    let app = test_app();
    register(&app, "SN001", "IN_STOCK", "Central Warehouse").await;

    let (status, task) = open_activation(&app, "Oficina Alfa", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["state"], "REQUESTED");
    assert_eq!(task["requester_name"], "Ana Souza");

    let (status, task) = send(&app, post(&task_uri(&task, "ready"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["state"], "READY_FOR_PROVISIONING");

    let (status, body) = send(
        &app,
        post(
            &task_uri(&task, "provisioning"),
            json!({ "serial_number": "SN001", "asset_tag": "PAT-SN001" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INCOMPLETE_PROVISIONING_DATA");
    assert_eq!(body["error"]["details"]["missing"], json!(["provisioning_code"]));

    let (status, done) = send(
        &app,
        post(
            &task_uri(&task, "provisioning"),
            json!({ "serial_number": "SN001", "asset_tag": "PAT-SN001", "provisioning_code": "123456" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["state"], "OTP_ISSUED");
    assert_eq!(done["provisioning_code"], "123456");

    let (_, device) = send(&app, get("/v1/devices/SN001")).await;
    assert_eq!(device["status"], "ACTIVE");
    assert_eq!(device["current_holder"], "Oficina Alfa");
}

// -- Scenario B: double binding -----------------------------------------------

#[tokio::test]
async fn test_second_activation_on_same_device_conflicts() {
    let app = test_app();
    register(&app, "SN002", "IN_STOCK", "Central Warehouse").await;

    let (status, _) = open_activation(&app, "Oficina Alfa", Some("SN002")).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = open_activation(&app, "Oficina Gama", Some("SN002")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DEVICE_ALREADY_BOUND");
}

// -- Scenario C: exchange -----------------------------------------------------

#[tokio::test]
async fn test_exchange_swaps_both_devices_on_completion() {
    let app = test_app();
    register(&app, "SN003", "ACTIVE", "Oficina Beta").await;
    register(&app, "SN004", "IN_STOCK", "Central Warehouse").await;

    let (status, task) = send(
        &app,
        post(
            "/v1/tasks/sales-requests",
            json!({
                "kind": "EXCHANGE",
                "client_name": "Oficina Beta",
                "release_serial": "SN003",
                "reason_code": "defect",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["release_serial"], "SN003");
    assert_eq!(task["reason_code"], "DEFECT");

    send(&app, post(&task_uri(&task, "ready"), json!({}))).await;
    let (status, _) = send(
        &app,
        post(
            &task_uri(&task, "provisioning"),
            json!({ "serial_number": "SN004", "asset_tag": "PAT-SN004", "provisioning_code": "998877" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, done) = send(&app, post(&task_uri(&task, "complete"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["state"], "COMPLETED");

    let (_, old) = send(&app, get("/v1/devices/SN003")).await;
    assert_eq!(old["status"], "IN_STOCK");
    assert_eq!(old["history"].as_array().unwrap().len(), 2);
    let (_, new) = send(&app, get("/v1/devices/SN004")).await;
    assert_eq!(new["status"], "ACTIVE");
    assert_eq!(new["current_holder"], "Oficina Beta");
    assert_eq!(new["history"].as_array().unwrap().len(), 2);

    // Completed is terminal.
    let (status, body) = send(&app, post(&task_uri(&task, "complete"), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_sales_request_with_unknown_reason_is_rejected() {
    let app = test_app();
    register(&app, "SN005", "ACTIVE", "Oficina Beta").await;
    let (status, body) = send(
        &app,
        post(
            "/v1/tasks/sales-requests",
            json!({
                "kind": "RETRIEVAL",
                "client_name": "Oficina Beta",
                "release_serial": "SN005",
                "reason_code": "DEFECT",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "UNKNOWN_REASON");
}

// -- Scenario D: removal of a unit in use -------------------------------------

#[tokio::test]
async fn test_remove_device_referenced_by_open_task_conflicts() {
    let app = test_app();
    register(&app, "SN006", "IN_STOCK", "Central Warehouse").await;
    let (status, _) = open_activation(&app, "Oficina Alfa", Some("SN006")).await;
    assert_eq!(status, StatusCode::CREATED);

    let request = Request::builder()
        .method("DELETE")
        .uri("/v1/devices/SN006")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DEVICE_IN_USE");
}

#[tokio::test]
async fn test_remove_free_device_returns_no_content() {
    let app = test_app();
    register(&app, "SN007", "DEFECTIVE", "Central Warehouse").await;
    let request = Request::builder()
        .method("DELETE")
        .uri("/v1/devices/SN007")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, get("/v1/devices/SN007")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Logistics and task queries -----------------------------------------------

#[tokio::test]
async fn test_shipment_request_flow_and_filters() {
    let app = test_app();
    let (status, task) = send(
        &app,
        post("/v1/tasks/shipment-requests", json!({ "client_name": "Oficina Delta" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["kind"], "SHIPMENT_REQUEST");

    let (status, _) = send(&app, post(&task_uri(&task, "ready"), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, queued) = send(&app, post(&task_uri(&task, "shipment"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queued["state"], "PENDING_SHIPMENT");

    send(
        &app,
        post("/v1/tasks/material-requests", json!({ "client_name": "Oficina Eta" })),
    )
    .await;

    let (_, list) = send(&app, get("/v1/tasks?kind=shipment_request")).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    let (_, list) = send(&app, get("/v1/tasks?client=eta")).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    let (_, list) = send(&app, get("/v1/tasks")).await;
    assert_eq!(list.as_array().unwrap().len(), 2);

    let id = task["id"].as_str().unwrap();
    let (status, fetched) = send(&app, get(&format!("/v1/tasks/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["transitions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_task_filter_by_single_day_includes_that_day() {
    let app = test_app();
    let (_, task) = send(
        &app,
        post("/v1/tasks/shipment-requests", json!({ "client_name": "Oficina Delta" })),
    )
    .await;
    let day = &task["created_at"].as_str().unwrap()[..10];

    let (status, list) = send(&app, get(&format!("/v1/tasks?from={day}&to={day}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], task["id"]);

    let (_, list) = send(&app, get(&format!("/v1/tasks?to={day}T00:00:00Z"))).await;
    let created_at_midnight = task["created_at"] == format!("{day}T00:00:00Z");
    assert_eq!(list.as_array().unwrap().len(), usize::from(created_at_midnight));
}

#[tokio::test]
async fn test_unknown_task_is_404() {
    let uri = format!("/v1/tasks/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&test_app(), get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "UNKNOWN_TASK");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/devices")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&test_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// -- OpenAPI and metrics ------------------------------------------------------

#[tokio::test]
async fn test_openapi_spec_is_served() {
    let response = test_app().oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/v1/tasks/{id}/provisioning"].is_object());
}

#[tokio::test]
async fn test_metrics_unavailable_without_recorder() {
    let (status, body) = send(&test_app(), get("/metrics")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_metrics_rendered_with_handle() {
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let app = posfleet_api::app(AppState::new().with_metrics(handle));
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
