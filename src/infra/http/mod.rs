//! The HTTP surface: route table and wire-level DTOs.

mod handlers;
pub mod state;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};

pub use state::ApiState;

/// `max_body_bytes` must match `IngestService`'s configured size limit, or
/// axum's body-length cap (2 MB by default) rejects uploads before the
/// ingest size check ever sees them.
pub fn router(state: ApiState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/ocr/submit", post(handlers::submit))
        .route("/ocr/status/{job_id}", get(handlers::status))
        .route("/ocr/result/{job_id}", get(handlers::result))
        .route("/ocr/jobs", get(handlers::list_jobs))
        .route("/ocr/jobs/{job_id}", delete(handlers::delete_job))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
