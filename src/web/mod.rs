//! REST and WebSocket surface.

pub mod error;
pub mod jobs;
pub mod ws;

use axum::Router;
use axum::routing::{delete, get, post};
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Creates the web server router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(jobs::root))
        .route("/health", get(jobs::health))
        .route("/jobs/submit", post(jobs::submit_job))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{job_id}/status", get(jobs::job_status))
        .route("/jobs/{job_id}/results", get(jobs::job_results))
        .route("/jobs/{job_id}", delete(jobs::cancel_job))
        .route("/ws", get(ws::watch_all))
        .route("/ws/jobs/{job_id}", get(ws::watch_job))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
