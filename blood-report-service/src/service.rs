use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    db::JobStore,
    error::ServiceError,
    models::{AnalyzeRequest, JobRecord, JobStatus},
    queue::TaskQueue,
    submit::submit_analysis_job,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub queue: Arc<dyn TaskQueue>,
}

pub fn create_app(store: JobStore, queue: Arc<dyn TaskQueue>) -> Router {
    build_router(AppState { store, queue })
}

fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/analyze", post(start_analysis))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Blood Test Report Analyser",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Queued blood test report analysis by a crew of five AI agents",
        "endpoints": {
            "POST /analyze": "Submit a report for analysis",
            "GET /jobs/{id}": "Get a job's status and final report",
            "GET /jobs?limit=N": "List recent jobs",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn start_analysis(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Value> {
    info!("Analysis requested for: {}", request.file_path);

    validate_request(&request)?;

    match submit_analysis_job(&state.store, state.queue.as_ref(), request).await {
        Ok(submission) => Ok(Json(json!({
            "result_id": submission.result_id,
            "task_id": submission.task_id,
            "status": JobStatus::Pending,
            "message": "Analysis queued"
        }))),
        Err(e @ ServiceError::DocumentNotFound { .. }) => {
            Err(not_found_error("File not found", &e.to_string()))
        }
        Err(e) => {
            error!("Failed to submit analysis: {}", e);
            Err(internal_error("Failed to submit analysis", &e.to_string()))
        }
    }
}

fn validate_request(request: &AnalyzeRequest) -> Result<(), ApiError> {
    if request.file_path.trim().is_empty() {
        return Err(bad_request_error("file_path is required"));
    }
    if request.query.trim().is_empty() {
        return Err(bad_request_error("query is required"));
    }
    Ok(())
}

async fn get_job(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<JobRecord> {
    match state.store.get(id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(not_found_error("Job not found", &id.to_string())),
        Err(e) => {
            error!("Failed to load job {}: {}", id, e);
            Err(internal_error("Failed to load job", &e.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<i64>,
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<JobRecord>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    state.store.list(limit).await.map(Json).map_err(|e| {
        error!("Failed to list jobs: {}", e);
        internal_error("Failed to list jobs", &e.to_string())
    })
}
