//! lightkeep-api — REST API for the Lightkeep service registry.
//!
//! Provides axum route handlers over the registry store and the health
//! checker. Mutations trigger an immediate probe so a create or update is
//! complete only once its first status is persisted.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/services` | List all services, sorted by display order |
//! | POST | `/api/services` | Create a service and probe it |
//! | PUT | `/api/services/{id}` | Update a service and re-probe it |
//! | DELETE | `/api/services/{id}` | Delete a service |
//! | PUT | `/api/services/reorder` | Apply a batch of display-order changes |
//! | GET | `/api/services/{id}/health` | On-demand health check |
//! | GET | `/api/health` | Liveness of the daemon itself |
//! | GET | `/api` | API info |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, put};
use tower_http::cors::CorsLayer;

use lightkeep_health::HealthScheduler;
use lightkeep_registry::RegistryStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: RegistryStore,
    pub checker: Arc<HealthScheduler>,
}

/// Build the complete API router.
///
/// CORS is wide open: the registry is a single-user LAN service consumed
/// by a browser frontend served from another origin.
pub fn build_router(store: RegistryStore, checker: Arc<HealthScheduler>) -> Router {
    let state = ApiState { store, checker };

    Router::new()
        .route("/api", get(handlers::api_info))
        .route("/api/health", get(handlers::daemon_health))
        .route(
            "/api/services",
            get(handlers::list_services).post(handlers::create_service),
        )
        .route("/api/services/reorder", put(handlers::reorder_services))
        .route(
            "/api/services/{id}",
            put(handlers::update_service).delete(handlers::delete_service),
        )
        .route("/api/services/{id}/health", get(handlers::check_service))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
