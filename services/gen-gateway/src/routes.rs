//! HTTP surface and error envelope
//!
//! Every response that is not a success carries the JSON envelope
//! `{"error":{"type","message","request_id","refund_eligible"}}` so the
//! external credit ledger can classify the failure without parsing message
//! text. `refund_eligible` is true whenever an account attempt may have been
//! spent or the job can never complete; requests rejected before any
//! dispatch are not refund eligible.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use base64::Engine;
use flow_gen::{Dispatcher, GenerationInput, OperationHandle};
use flow_pool::{Error, UpstreamError, pool_summary};
use flow_store::AccountStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;

use crate::metrics;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<dyn AccountStore>,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/v1/images/upload", post(upload_image))
        .route("/v1/generations", post(create_generation))
        .route("/v1/images", post(create_flow_image))
        .route("/v1/images/upscale", post(upscale_image))
        .route("/v1/videos/upscale", post(upscale_video))
        .route("/v1/tasks/status", post(check_task_status))
        .route("/v1/operations/status", post(check_operation_status))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest {
    image: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpscaleRequest {
    media_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskStatusRequest {
    task_id: String,
    account_id: String,
    #[serde(default)]
    scene_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationStatusRequest {
    operation_name: String,
    account_id: String,
}

fn request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

fn error_envelope(
    status: StatusCode,
    kind: &str,
    message: String,
    request_id: &str,
    refund_eligible: bool,
) -> Response {
    json_response(
        status,
        serde_json::json!({
            "error": {
                "type": kind,
                "message": message,
                "request_id": request_id,
                "refund_eligible": refund_eligible,
            }
        }),
    )
}

/// Reject a request before any account attempt is spent.
fn invalid_request(message: String, request_id: &str) -> Response {
    error_envelope(StatusCode::BAD_REQUEST, "invalid_request", message, request_id, false)
}

/// Unwrap a JSON body, turning axum's plain-text rejection into the envelope.
fn parse_body<T>(payload: Result<Json<T>, JsonRejection>, request_id: &str) -> Result<T, Response> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(e) => Err(invalid_request(
            format!("invalid request body: {}", e.body_text()),
            request_id,
        )),
    }
}

/// Map a dispatch failure to the caller-facing envelope.
fn dispatch_error(route: &'static str, err: Error, request_id: &str) -> Response {
    let (status, kind, refund_eligible) = match &err {
        Error::NoAccountsAvailable(_) | Error::AllAccountsFailed { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "pool_exhausted", true)
        }
        Error::Fatal(UpstreamError::InvalidRequest(_)) => {
            (StatusCode::BAD_REQUEST, "invalid_request", false)
        }
        Error::Fatal(_) => (StatusCode::BAD_GATEWAY, "upstream_error", true),
    };
    metrics::record_request(route, status.as_u16());
    error_envelope(status, kind, err.to_string(), request_id, refund_eligible)
}

fn handle_response(route: &'static str, handle: &OperationHandle, request_id: &str) -> Response {
    metrics::record_request(route, 200);
    json_response(
        StatusCode::OK,
        serde_json::json!({
            "taskId": handle.task_id,
            "sceneId": handle.scene_id,
            "accountId": handle.account_id,
            "requestId": request_id,
        }),
    )
}

fn check_base64(payload: &str, field: &str, request_id: &str) -> Result<(), Response> {
    if payload.is_empty() {
        return Err(invalid_request(format!("{field} must not be empty"), request_id));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map(|_| ())
        .map_err(|e| invalid_request(format!("{field} is not valid base64: {e}"), request_id))
}

fn check_prompt(input: &GenerationInput, request_id: &str) -> Result<(), Response> {
    if input.prompt.trim().is_empty() {
        return Err(invalid_request("prompt must not be empty".into(), request_id));
    }
    Ok(())
}

async fn upload_image(
    State(state): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Response {
    const ROUTE: &str = "/v1/images/upload";
    let request_id = request_id();
    let req = match parse_body(payload, &request_id) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_base64(&req.image, "image", &request_id) {
        return resp;
    }
    match state.dispatcher.upload_image(&req.image).await {
        Ok(media_id) => {
            metrics::record_request(ROUTE, 200);
            json_response(
                StatusCode::OK,
                serde_json::json!({ "mediaId": media_id, "requestId": request_id }),
            )
        }
        Err(e) => dispatch_error(ROUTE, e, &request_id),
    }
}

async fn create_generation(
    State(state): State<AppState>,
    payload: Result<Json<GenerationInput>, JsonRejection>,
) -> Response {
    const ROUTE: &str = "/v1/generations";
    let request_id = request_id();
    let input = match parse_body(payload, &request_id) {
        Ok(input) => input,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_prompt(&input, &request_id) {
        return resp;
    }
    for (index, reference) in input.reference_images.iter().enumerate() {
        if let Err(resp) = check_base64(reference, &format!("referenceImages[{index}]"), &request_id)
        {
            return resp;
        }
    }
    match state.dispatcher.create_generation(input).await {
        Ok(handle) => handle_response(ROUTE, &handle, &request_id),
        Err(e) => dispatch_error(ROUTE, e, &request_id),
    }
}

async fn create_flow_image(
    State(state): State<AppState>,
    payload: Result<Json<GenerationInput>, JsonRejection>,
) -> Response {
    const ROUTE: &str = "/v1/images";
    let request_id = request_id();
    let input = match parse_body(payload, &request_id) {
        Ok(input) => input,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_prompt(&input, &request_id) {
        return resp;
    }
    match state.dispatcher.create_flow_image(input).await {
        Ok(handle) => handle_response(ROUTE, &handle, &request_id),
        Err(e) => dispatch_error(ROUTE, e, &request_id),
    }
}

async fn upscale_image(
    State(state): State<AppState>,
    payload: Result<Json<UpscaleRequest>, JsonRejection>,
) -> Response {
    const ROUTE: &str = "/v1/images/upscale";
    let request_id = request_id();
    let req = match parse_body(payload, &request_id) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    if req.media_id.is_empty() {
        return invalid_request("mediaId must not be empty".into(), &request_id);
    }
    match state.dispatcher.upscale_image(&req.media_id).await {
        Ok(handle) => handle_response(ROUTE, &handle, &request_id),
        Err(e) => dispatch_error(ROUTE, e, &request_id),
    }
}

async fn upscale_video(
    State(state): State<AppState>,
    payload: Result<Json<UpscaleRequest>, JsonRejection>,
) -> Response {
    const ROUTE: &str = "/v1/videos/upscale";
    let request_id = request_id();
    let req = match parse_body(payload, &request_id) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    if req.media_id.is_empty() {
        return invalid_request("mediaId must not be empty".into(), &request_id);
    }
    match state.dispatcher.upscale_video(&req.media_id).await {
        Ok(handle) => handle_response(ROUTE, &handle, &request_id),
        Err(e) => dispatch_error(ROUTE, e, &request_id),
    }
}

async fn check_task_status(
    State(state): State<AppState>,
    payload: Result<Json<TaskStatusRequest>, JsonRejection>,
) -> Response {
    const ROUTE: &str = "/v1/tasks/status";
    let request_id = request_id();
    let req = match parse_body(payload, &request_id) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    if req.task_id.is_empty() || req.account_id.is_empty() {
        return invalid_request("taskId and accountId are required".into(), &request_id);
    }
    let handle = OperationHandle {
        task_id: req.task_id,
        scene_id: req.scene_id,
        account_id: req.account_id,
    };
    let status = state.dispatcher.check_status(&handle).await;
    metrics::record_request(ROUTE, 200);
    let mut body = serde_json::to_value(&status).unwrap_or_default();
    body["requestId"] = serde_json::Value::String(request_id);
    json_response(StatusCode::OK, body)
}

async fn check_operation_status(
    State(state): State<AppState>,
    payload: Result<Json<OperationStatusRequest>, JsonRejection>,
) -> Response {
    const ROUTE: &str = "/v1/operations/status";
    let request_id = request_id();
    let req = match parse_body(payload, &request_id) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    if req.operation_name.is_empty() || req.account_id.is_empty() {
        return invalid_request(
            "operationName and accountId are required".into(),
            &request_id,
        );
    }
    let handle = OperationHandle {
        task_id: req.operation_name,
        scene_id: String::new(),
        account_id: req.account_id,
    };
    let status = state.dispatcher.check_status(&handle).await;
    metrics::record_request(ROUTE, 200);
    let mut body = serde_json::to_value(&status).unwrap_or_default();
    body["requestId"] = serde_json::Value::String(request_id);
    json_response(StatusCode::OK, body)
}

/// Health endpoint: pool quota posture plus store reachability. Returns 200
/// while the pool can serve (healthy or degraded), 503 when it cannot.
async fn health_handler(State(state): State<AppState>) -> Response {
    let summary = pool_summary(state.store.as_ref()).await;
    let status = if summary["status"] == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    json_response(status, summary)
}

/// Prometheus metrics endpoint — text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
        .into_response()
}
