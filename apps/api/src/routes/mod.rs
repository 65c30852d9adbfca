pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::screening::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_mb.saturating_mul(1024 * 1024);

    Router::new()
        .route("/health", get(health::health_handler))
        // Requirements preview
        .route(
            "/api/v1/requirements/parse",
            post(handlers::handle_parse_requirements),
        )
        // Single-resume preview
        .route("/api/v1/resumes/parse", post(handlers::handle_parse_resume))
        // Batch screening
        .route("/api/v1/screenings", post(handlers::handle_create_screening))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
