//! Orchestrator API handlers.

use axum::{extract::State, Json};
use harvester_core::OrchestratorStatus;
use std::sync::Arc;

use crate::state::AppState;

/// Get orchestrator status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatus> {
    Json(state.orchestrator().status())
}
