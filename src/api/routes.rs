//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    append_log_handler, create_record_handler, create_user_handler, get_record_handler,
    health_handler, list_types_handler, stats_handler, update_record_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/records/:app/:model", post(create_record_handler))
        .route(
            "/records/:app/:model/:id",
            get(get_record_handler).patch(update_record_handler),
        )
        .route("/records/:app/:model/:id/log", post(append_log_handler))
        .route("/users", post(create_user_handler))
        .route("/types", get(list_types_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
