//! REST API handlers.
//!
//! Each handler calls into the engine or the exposure controller and wraps
//! the outcome in the `{success, data, error}` envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use appgrid_state::{Application, PluginModel};
use appgrid_sync::{ComponentSpec, ErrorKind, SyncError, SyncResult};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn status_of(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::System => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn sync_error(e: &SyncError) -> Response {
    if e.is_user_facing() {
        return error_response(&e.to_string(), status_of(e.kind())).into_response();
    }
    error!(error = %e, "request failed");
    error_response("internal error", StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

fn respond<T: Serialize>(result: SyncResult<T>, status: StatusCode) -> Response {
    match result {
        Ok(data) => (status, ApiResponse::ok(data)).into_response(),
        Err(e) => sync_error(&e),
    }
}

// ── Applications ───────────────────────────────────────────────

/// PUT /api/v1/apps/:app_id
pub async fn put_application(
    State(state): State<ApiState>,
    Path(app_id): Path<String>,
    Json(mut app): Json<Application>,
) -> Response {
    app.app_id = app_id;
    respond(state.engine.put_application(app), StatusCode::OK)
}

/// GET /api/v1/apps/:app_id
pub async fn get_application(
    State(state): State<ApiState>,
    Path(app_id): Path<String>,
) -> Response {
    respond(state.engine.get_application(&app_id), StatusCode::OK)
}

/// Body of a synchronization request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    #[serde(default)]
    pub delete_component_ids: Vec<String>,
}

/// POST /api/v1/apps/:app_id/sync
pub async fn sync_components(
    State(state): State<ApiState>,
    Path(app_id): Path<String>,
    Json(req): Json<SyncRequest>,
) -> Response {
    let result = state.engine.get_application(&app_id).and_then(|app| {
        state
            .engine
            .sync_components(&app, &req.components, &req.delete_component_ids)
    });
    respond(result, StatusCode::OK)
}

// ── Components ─────────────────────────────────────────────────

/// GET /api/v1/components/:id
pub async fn get_component(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    respond(state.engine.get_component(&id), StatusCode::OK)
}

/// DELETE /api/v1/components/:id
pub async fn delete_component(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let result = state
        .engine
        .delete_component(&id)
        .map(|rows| serde_json::json!({ "component_id": id, "rows_deleted": rows }));
    respond(result, StatusCode::OK)
}

/// Batch delete request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchDeleteRequest {
    pub component_ids: Vec<String>,
}

/// POST /api/v1/components/batch-delete
pub async fn delete_components(
    State(state): State<ApiState>,
    Json(req): Json<BatchDeleteRequest>,
) -> Response {
    let result = state
        .engine
        .delete_components(&req.component_ids)
        .map(|rows| serde_json::json!({ "rows_deleted": rows }));
    respond(result, StatusCode::OK)
}

// ── Port exposure ──────────────────────────────────────────────

/// Toggle request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleRequest {
    pub open: bool,
}

/// PUT /api/v1/components/:id/ports/:port/outer
pub async fn toggle_outer(
    State(state): State<ApiState>,
    Path((id, port)): Path<(String, u16)>,
    Json(req): Json<ToggleRequest>,
) -> Response {
    respond(
        state.exposure.toggle_external(&id, port, req.open).await,
        StatusCode::OK,
    )
}

/// PUT /api/v1/components/:id/ports/:port/inner
pub async fn toggle_inner(
    State(state): State<ApiState>,
    Path((id, port)): Path<(String, u16)>,
    Json(req): Json<ToggleRequest>,
) -> Response {
    respond(
        state.exposure.toggle_internal(&id, port, req.open).await,
        StatusCode::OK,
    )
}

/// Stream port request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamPortRequest {
    pub plugin_model: PluginModel,
    pub container_port: u16,
}

/// POST /api/v1/components/:id/stream-ports
pub async fn allocate_stream_port(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<StreamPortRequest>,
) -> Response {
    respond(
        state
            .exposure
            .allocate_stream_port(&id, req.plugin_model, req.container_port),
        StatusCode::CREATED,
    )
}

// ── Dependencies ───────────────────────────────────────────────

/// POST /api/v1/components/:id/dependencies/:dep_id
pub async fn add_dependency(
    State(state): State<ApiState>,
    Path((id, dep_id)): Path<(String, String)>,
) -> Response {
    match state.engine.add_dependency(&id, &dep_id) {
        Ok(true) => (StatusCode::CREATED, ApiResponse::ok("added")).into_response(),
        Ok(false) => ApiResponse::ok("exists").into_response(),
        Err(e) => sync_error(&e),
    }
}

/// DELETE /api/v1/components/:id/dependencies/:dep_id
pub async fn remove_dependency(
    State(state): State<ApiState>,
    Path((id, dep_id)): Path<(String, String)>,
) -> Response {
    match state.engine.remove_dependency(&id, &dep_id) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("dependency not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => sync_error(&e),
    }
}
