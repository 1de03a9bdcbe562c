use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod health;
pub mod metrics;
pub mod reports;

/// Largest accepted request body, photo included.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Report and health routes. The metrics endpoint and middleware layers are
/// added by the server binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/v1/missing-persons",
            post(reports::create_report).get(reports::list_reports),
        )
        .route("/api/v1/missing-persons/{id}", get(reports::get_report))
        .route(
            "/api/v1/missing-persons/{id}/requeue",
            post(reports::requeue_report),
        )
        // Multipart otherwise stops at axum's 2 MB default
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
