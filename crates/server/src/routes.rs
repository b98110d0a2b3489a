//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::handlers::uploads::{TUS_RESUMABLE, TUS_VERSION};
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

async fn with_tus_resumable(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(TUS_RESUMABLE, HeaderValue::from_static(TUS_VERSION));
    response
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let upload_routes = Router::new()
        .route(
            "/v1/uploads",
            post(handlers::create_upload)
                .get(handlers::list_uploads)
                .options(handlers::upload_options),
        )
        .route(
            "/v1/uploads/{upload_id}",
            get(handlers::get_upload)
                .head(handlers::head_upload)
                .patch(handlers::patch_upload)
                .delete(handlers::delete_upload),
        )
        .layer(middleware::map_response(with_tus_resumable));

    let mut router = Router::new()
        .merge(upload_routes)
        // Unauthenticated for load balancer probes.
        .route("/v1/health", get(handlers::health_check));

    // Must be network-restricted to the scraper when enabled.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    let body_limit = usize::try_from(state.config.server.max_chunk_size).unwrap_or(usize::MAX);
    let concurrency = state.config.server.max_concurrent_requests;

    // Outermost last: TraceLayer -> concurrency limit -> auth -> body limit -> handler
    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(ConcurrencyLimitLayer::new(concurrency))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
