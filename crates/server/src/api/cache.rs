//! Artifact cache API handlers.

use axum::{extract::State, http::StatusCode, Json};
use harvester_core::CacheStats;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

/// Snapshot response
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    /// False when the cache has no snapshot backend.
    pub written: bool,
    pub stats: CacheStats,
}

#[derive(Debug, Serialize)]
pub struct CacheErrorResponse {
    pub error: String,
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache().stats())
}

/// Persist the cache now, regardless of the periodic schedule.
pub async fn snapshot(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SnapshotResponse>, (StatusCode, Json<CacheErrorResponse>)> {
    let cache = state.cache().clone();
    let written = tokio::task::spawn_blocking(move || cache.force_snapshot())
        .await
        .map_err(|e| internal_error(e.to_string()))?
        .map_err(|e| {
            warn!(error = %e, "Manual cache snapshot failed");
            internal_error(e.to_string())
        })?;

    Ok(Json(SnapshotResponse {
        written,
        stats: state.cache().stats(),
    }))
}

fn internal_error(error: String) -> (StatusCode, Json<CacheErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(CacheErrorResponse { error }),
    )
}
