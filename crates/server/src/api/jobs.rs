//! Job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use harvester_core::{
    CreateJobRequest, Job, JobError, JobFilter, JobStatus, OrchestratorError, Period,
    ProgressSnapshot,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a job
#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    /// Raw item identifiers; normalized and de-duplicated on creation.
    pub items: Vec<String>,
    /// Explicit candidate periods (skip the resolver).
    pub periods: Option<Vec<PeriodBody>>,
    #[serde(default)]
    pub force_refresh: bool,
}

/// Period in request body
#[derive(Debug, Deserialize)]
pub struct PeriodBody {
    pub year: i32,
    pub quarter: u8,
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for list endpoint
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Result of a pause/resume/cancel request.
///
/// `applied` is false when the job exists but was not in a state the
/// operation applies to.
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub job_id: String,
    pub applied: bool,
    pub status: JobStatus,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<JobErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(JobErrorResponse {
            error: message.into(),
        }),
    )
}

fn error_response(err: OrchestratorError) -> ApiError {
    let status = match &err {
        OrchestratorError::JobNotFound(_) | OrchestratorError::JobStore(JobError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        OrchestratorError::JobStore(JobError::InvalidState { .. }) => StatusCode::CONFLICT,
        OrchestratorError::JobStore(JobError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(JobErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new job
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateJobBody>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let periods = match body.periods {
        Some(raw) => {
            let mut periods = Vec::with_capacity(raw.len());
            for p in raw {
                let period =
                    Period::new(p.year, p.quarter).map_err(|e| bad_request(e.to_string()))?;
                periods.push(period);
            }
            Some(periods)
        }
        None => None,
    };

    let request = CreateJobRequest::new(body.items.as_slice(), periods, body.force_refresh)
        .map_err(|e| bad_request(e.to_string()))?;

    let job = state.orchestrator().create_job(request).map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    state
        .orchestrator()
        .get_job(&id)
        .map(Json)
        .map_err(error_response)
}

/// Get the progress snapshot of a job
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    state
        .orchestrator()
        .get_progress(&id)
        .map(Json)
        .map_err(error_response)
}

/// List jobs with optional status filter
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref raw) = params.status {
        let status = JobStatus::parse(raw)
            .ok_or_else(|| bad_request(format!("Unknown job status: {}", raw)))?;
        filter = filter.with_status(status);
    }

    let (jobs, total) = state
        .orchestrator()
        .list_jobs(&filter)
        .map_err(error_response)?;

    Ok(Json(ListJobsResponse {
        jobs,
        total,
        limit,
        offset,
    }))
}

/// Pause a running job at its next batch boundary
pub async fn pause_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ControlResponse>, ApiError> {
    let applied = state.orchestrator().pause(&id).map_err(error_response)?;
    control_response(&state, id, applied)
}

/// Re-queue a paused job at the head of the queue
pub async fn resume_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ControlResponse>, ApiError> {
    let applied = state.orchestrator().resume(&id).map_err(error_response)?;
    control_response(&state, id, applied)
}

/// Cancel a pending, running or paused job
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ControlResponse>, ApiError> {
    let applied = state.orchestrator().cancel(&id).map_err(error_response)?;
    control_response(&state, id, applied)
}

/// Delete a job and its checkpoint
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    state
        .orchestrator()
        .delete_job(&id)
        .map(Json)
        .map_err(error_response)
}

fn control_response(
    state: &AppState,
    job_id: String,
    applied: bool,
) -> Result<Json<ControlResponse>, ApiError> {
    let job = state.orchestrator().get_job(&job_id).map_err(error_response)?;
    Ok(Json(ControlResponse {
        job_id,
        applied,
        status: job.status,
    }))
}
