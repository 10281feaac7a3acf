use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{cache, handlers, jobs, middleware, orchestrator};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Jobs
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/jobs/{id}/progress", get(jobs::get_progress))
        .route("/jobs/{id}/pause", post(jobs::pause_job))
        .route("/jobs/{id}/resume", post(jobs::resume_job))
        .route("/jobs/{id}/cancel", post(jobs::cancel_job))
        // Artifact cache
        .route("/cache/stats", get(cache::get_stats))
        .route("/cache/snapshot", post(cache::snapshot))
        // Orchestrator
        .route("/orchestrator/status", get(orchestrator::get_status))
        .layer(from_fn(middleware::metrics_middleware))
        .with_state(state.clone());

    Router::new()
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
