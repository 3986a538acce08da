//! Axum router construction.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = usize::try_from(ctx.config.server.max_upload_bytes).unwrap_or(usize::MAX);

    let api = Router::new()
        .route(
            "/convert",
            post(routes::convert::convert).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/health", get(routes::health::health_check))
        .route("/tools", get(routes::tools::tools));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
