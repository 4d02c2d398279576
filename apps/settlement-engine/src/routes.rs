//! HTTP surface: a health check and the settlements read/invoice API. The
//! background workers do the rest of the work; this is a thin view over it.

use crate::handlers::settlements;
use crate::state::AppState;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let settlements_routes = Router::new()
        .route("/", get(settlements::list))
        .route("/:id", get(settlements::get))
        .route("/:id/invoice", post(settlements::invoice));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api/v1/settlements", settlements_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
