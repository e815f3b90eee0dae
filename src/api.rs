//! REST API server for the wallet agent coordinator
//!
//! Exposes `process_message` synchronously and as background jobs, plus
//! read-only views of sessions and audited runs.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::Coordinator;
use crate::jobs::JobTracker;
use crate::models::ProcessRequest;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn not_found(what: &str, id: impl std::fmt::Display) -> ApiResult {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error(format!("{} {} not found", what, id))),
    )
}

fn reject_empty(req: &ProcessRequest) -> Option<ApiResult> {
    req.message.trim().is_empty().then(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("message must not be empty".into())),
        )
    })
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<Coordinator>,
    pub jobs: JobTracker,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Message Endpoints
/// =============================

async fn process_message(
    State(state): State<ApiState>,
    Json(req): Json<ProcessRequest>,
) -> ApiResult {
    if let Some(rejection) = reject_empty(&req) {
        return rejection;
    }
    info!(session_id = ?req.session_id, mode = ?req.mode, "Received message");

    let response = state.coordinator.process_message(req).await;
    (StatusCode::OK, Json(ApiResponse::success(response)))
}

async fn submit_job(State(state): State<ApiState>, Json(req): Json<ProcessRequest>) -> ApiResult {
    if let Some(rejection) = reject_empty(&req) {
        return rejection;
    }

    let coordinator = state.coordinator.clone();
    let job_id = state
        .jobs
        .submit(async move { coordinator.process_message(req).await });

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(serde_json::json!({ "jobId": job_id }))),
    )
}

async fn get_job(State(state): State<ApiState>, Path(job_id): Path<Uuid>) -> ApiResult {
    match state.jobs.get(job_id) {
        Some(snapshot) => (StatusCode::OK, Json(ApiResponse::success(snapshot))),
        None => not_found("job", job_id),
    }
}

async fn cancel_job(State(state): State<ApiState>, Path(job_id): Path<Uuid>) -> ApiResult {
    match state.jobs.cancel(job_id) {
        Some(snapshot) => (StatusCode::OK, Json(ApiResponse::success(snapshot))),
        None => not_found("job", job_id),
    }
}

/// =============================
/// Inspection Endpoints
/// =============================

async fn get_session(State(state): State<ApiState>, Path(session_id): Path<String>) -> ApiResult {
    let session = state
        .coordinator
        .sessions()
        .and_then(|sessions| sessions.get(&session_id));

    match session {
        Some(session) => (StatusCode::OK, Json(ApiResponse::success(session))),
        None => not_found("session", session_id),
    }
}

async fn list_session_runs(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    match state.coordinator.audit_log().list_for_session(&session_id).await {
        Ok(run_ids) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "sessionId": session_id,
                "runIds": run_ids
            }))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Audit lookup failed: {}", e))),
        ),
    }
}

async fn get_run(State(state): State<ApiState>, Path(run_id): Path<Uuid>) -> ApiResult {
    match state.coordinator.audit_log().get(run_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(ApiResponse::success(record))),
        Ok(None) => not_found("run", run_id),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Audit lookup failed: {}", e))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/message", post(process_message))
        .route("/api/jobs", post(submit_job))
        .route("/api/jobs/:id", get(get_job).delete(cancel_job))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/runs", get(list_session_runs))
        .route("/api/runs/:id", get(get_run))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Background Maintenance
/// =============================

/// Periodically evict idle sessions and purge old jobs and run records
pub fn spawn_maintenance(state: ApiState, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;

            let sessions = state
                .coordinator
                .sessions()
                .map(|sessions| sessions.sweep_idle(ttl))
                .unwrap_or(0);
            let jobs = state.jobs.purge_older_than(ttl);
            let runs = state.coordinator.audit_log().purge_older_than(ttl).await;

            debug!(sessions, jobs, runs, "Maintenance sweep");
        }
    })
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    coordinator: Arc<Coordinator>,
    port: u16,
    ttl: Duration,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let state = ApiState {
        coordinator,
        jobs: JobTracker::new(),
    };

    let maintenance = spawn_maintenance(state.clone(), ttl, Duration::from_secs(60));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    let served = axum::serve(listener, router).await;
    maintenance.abort();
    served?;

    Ok(())
}
