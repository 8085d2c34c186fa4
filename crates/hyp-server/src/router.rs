use axum::{routing::get, Router};
use hyp_protocol::endpoints;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all Hyperspace endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::REQUIRE, get(handler::require_handler))
        .route(&format!("{}/:key/*path", endpoints::ASSET), get(handler::asset_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
