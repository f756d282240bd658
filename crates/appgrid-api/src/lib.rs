//! appgrid-api — REST API for AppGrid.
//!
//! Thin axum handlers over [`SyncEngine`] and [`ExposureController`].
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | PUT | `/api/v1/apps/{app_id}` | Store an application |
//! | GET | `/api/v1/apps/{app_id}` | Get an application |
//! | POST | `/api/v1/apps/{app_id}/sync` | Synchronize components of an application |
//! | GET | `/api/v1/components/{id}` | Get a component |
//! | DELETE | `/api/v1/components/{id}` | Delete a component and its aspects |
//! | POST | `/api/v1/components/batch-delete` | Delete several components |
//! | PUT | `/api/v1/components/{id}/ports/{port}/outer` | Toggle external exposure |
//! | PUT | `/api/v1/components/{id}/ports/{port}/inner` | Toggle internal exposure |
//! | POST | `/api/v1/components/{id}/stream-ports` | Allocate a stream plugin port |
//! | POST | `/api/v1/components/{id}/dependencies/{dep_id}` | Add a dependency |
//! | DELETE | `/api/v1/components/{id}/dependencies/{dep_id}` | Remove a dependency |

pub mod handlers;

use appgrid_sync::{ExposureController, SyncEngine};
use axum::Router;
use axum::routing::{get, post, put};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: SyncEngine,
    pub exposure: ExposureController,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/apps/{app_id}", get(handlers::get_application).put(handlers::put_application))
        .route("/apps/{app_id}/sync", post(handlers::sync_components))
        .route("/components/batch-delete", post(handlers::delete_components))
        .route(
            "/components/{id}",
            get(handlers::get_component).delete(handlers::delete_component),
        )
        .route("/components/{id}/ports/{port}/outer", put(handlers::toggle_outer))
        .route("/components/{id}/ports/{port}/inner", put(handlers::toggle_inner))
        .route("/components/{id}/stream-ports", post(handlers::allocate_stream_port))
        .route(
            "/components/{id}/dependencies/{dep_id}",
            post(handlers::add_dependency).delete(handlers::remove_dependency),
        )
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
