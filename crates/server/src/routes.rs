//! Route configuration.

use crate::auth::trace_middleware;
use crate::handlers;
use crate::metrics::{metrics_handler, register_metrics};
use crate::ratelimit::ip_rate_limit_middleware;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::status))
        // ARK references contain ':' and arbitrary '/', so resolution is the fallback.
        .fallback(handlers::resolve);

    if !state.config.server.resolver_only {
        let write_routes = Router::new()
            .route("/mint", post(handlers::mint))
            .route("/update", put(handlers::update))
            .route("/bulk_query", post(handlers::bulk_query))
            .route("/bulk_update", post(handlers::bulk_update))
            .route("/bulk_mint", post(handlers::bulk_mint));
        router = router.merge(write_routes);
    }

    // SECURITY: /metrics is unauthenticated; restrict it at the network level.
    if state.config.server.metrics_enabled {
        register_metrics();
        router = router.route("/metrics", get(metrics_handler));
    }

    let rate_limit_state = state.rate_limit.clone();
    let max_body_bytes = state.config.server.max_body_bytes;

    // Layers run outermost first: TraceLayer -> trace id span -> IP rate limit -> handler
    router
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn_with_state(
            rate_limit_state,
            ip_rate_limit_middleware,
        ))
        .layer(middleware::from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
