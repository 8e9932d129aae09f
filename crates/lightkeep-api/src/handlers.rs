//! REST API handlers.
//!
//! Each handler reads/writes via `RegistryStore` and returns JSON. Probe
//! failures never fail a request: they only ever show up as an `unhealthy`
//! status on the affected record.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use lightkeep_health::CheckOutcome;
use lightkeep_registry::*;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
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

// ── Services ───────────────────────────────────────────────────

/// GET /api/services
pub async fn list_services(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list() {
        Ok(mut services) => {
            // Ordering by display_order is a presentation concern, applied
            // here only; the stable sort keeps insertion order on ties.
            services.sort_by_key(|s| s.display_order);
            ApiResponse::ok(services).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// Reply body for a successful create.
#[derive(serde::Serialize)]
pub struct CreatedService {
    pub id: ServiceId,
    pub status: HealthStatus,
}

/// POST /api/services
pub async fn create_service(
    State(state): State<ApiState>,
    Json(data): Json<NewService>,
) -> impl IntoResponse {
    if data.name.trim().is_empty() {
        return error_response("name is required", StatusCode::BAD_REQUEST).into_response();
    }
    let id = match state.store.create(data) {
        Ok(id) => id,
        Err(e) => {
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
    };
    // The create is complete only once the first probe result is persisted;
    // records without a target simply stay unknown.
    let status = match state.checker.check_by_id(id).await {
        Ok(CheckOutcome::Checked(status)) => status,
        Ok(_) => HealthStatus::Unknown,
        Err(e) => {
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
    };
    (StatusCode::CREATED, ApiResponse::ok(CreatedService { id, status })).into_response()
}

/// PUT /api/services/{id}
pub async fn update_service(
    State(state): State<ApiState>,
    Path(id): Path<ServiceId>,
    Json(patch): Json<ServiceUpdate>,
) -> impl IntoResponse {
    match state.store.update(id, patch) {
        Ok(true) => {}
        Ok(false) => {
            return error_response("service not found", StatusCode::NOT_FOUND).into_response();
        }
        Err(e) => {
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
    }
    // Re-probe with the fresh fields before acknowledging the update.
    match state.checker.check_by_id(id).await {
        Ok(_) => ApiResponse::ok("updated").into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// DELETE /api/services/{id}
pub async fn delete_service(
    State(state): State<ApiState>,
    Path(id): Path<ServiceId>,
) -> impl IntoResponse {
    match state.store.delete(id) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("service not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Reorder ────────────────────────────────────────────────────

/// Reorder request body.
#[derive(serde::Deserialize)]
pub struct ReorderRequest {
    pub services: Vec<ReorderEntry>,
}

/// PUT /api/services/reorder
pub async fn reorder_services(
    State(state): State<ApiState>,
    Json(req): Json<ReorderRequest>,
) -> impl IntoResponse {
    match state.store.reorder(&req.services) {
        Ok(()) => ApiResponse::ok("reordered").into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /api/services/{id}/health
pub async fn check_service(
    State(state): State<ApiState>,
    Path(id): Path<ServiceId>,
) -> impl IntoResponse {
    match state.checker.check_by_id(id).await {
        Ok(CheckOutcome::Checked(status)) => {
            ApiResponse::ok(serde_json::json!({ "status": status })).into_response()
        }
        Ok(CheckOutcome::NoTarget) => error_response(
            "service has no usable probe target",
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .into_response(),
        Ok(CheckOutcome::NotFound) => {
            error_response("service not found", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/health — liveness of the daemon itself.
pub async fn daemon_health() -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    }))
}

/// GET /api
pub async fn api_info() -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({
        "message": "Lightkeep service registry API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /api/services - List all services",
            "POST /api/services - Create a service",
            "PUT /api/services/{id} - Update a service",
            "DELETE /api/services/{id} - Delete a service",
            "PUT /api/services/reorder - Reorder services",
            "GET /api/services/{id}/health - On-demand health check",
        ],
    }))
}
