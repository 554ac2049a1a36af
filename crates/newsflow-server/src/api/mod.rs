pub mod runs;

use axum::Router;

use newsflow_core::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new().nest("/api/runs", runs::router())
}
