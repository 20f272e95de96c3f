//! API Routes
//!
//! Configures the Axum router: administrative endpoints plus the proxy
//! fallback that carries all site traffic.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    content_handler, health_handler, stats_handler, worker_message_handler,
    worker_status_handler, AppState,
};
use super::proxy::proxy_handler;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /_cache/stats` - Memory cache statistics
/// - `GET /_worker/status` - Active/waiting worker and cache partitions
/// - `POST /_worker/message` - Control messages (SKIP_WAITING, CLEAR_CACHE)
/// - `GET /_content/:section` - Tiered content lookup
/// - anything else - routed through the offline worker
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/_cache/stats", get(stats_handler))
        .route("/_worker/status", get(worker_status_handler))
        .route("/_worker/message", post(worker_message_handler))
        .route("/_content/:section", get(content_handler))
        .fallback(proxy_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
