//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/queue", get(api::queue_length))
        .route("/queue/reprocess", post(api::reprocess))
        // Query-string form MUST come first: identifiers that begin with `/`
        // cannot travel in a path segment.
        .route(
            "/cookiejar",
            get(api::get_cookie_by_query).delete(api::delete_cookie_by_query),
        )
        .route(
            "/cookiejar/{*identifier}",
            get(api::get_cookie).delete(api::delete_cookie),
        )
        .route("/debug/threads", get(api::threads))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
