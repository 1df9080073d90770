//! REST API handlers
//!
//! Thin JSON wrapper over [`Harvester`](crate::crawler::Harvester).

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::crawler::HarvestRequest;
use crate::error::Error;
use crate::metrics;
use crate::models::RecordFilter;

use super::server::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub running_harvests: usize,
    pub providers: Vec<String>,
}

/// Accepted harvest
#[derive(Debug, Serialize)]
pub struct StartedResponse {
    pub session_id: String,
}

/// Query string of the provider check
#[derive(Debug, Default, Deserialize)]
pub struct CheckParams {
    pub server: Option<String>,
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidRequest(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &Error) -> Response {
    let status = status_for(error);
    if status.is_server_error() {
        tracing::error!(error = %error, "Request failed");
    }
    (status, Json(ErrorResponse::new(error.to_string()))).into_response()
}

fn not_found(message: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message))).into_response()
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        // Harvest endpoints
        .route("/api/harvest", post(start_harvest))
        .route("/api/progress/{session_id}", get(get_progress))
        .route("/api/sessions/{session_id}", get(get_session))
        // Data endpoints
        .route("/api/stats", get(get_stats))
        .route("/api/records", get(list_records))
        .route("/api/clear", post(clear_all))
        // Provider endpoints
        .route("/api/providers/{name}/test", get(test_provider))
        .route("/metrics", get(metrics_text))
        .route_layer(middleware::from_fn(track_requests))
        .with_state(state)
}

async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;
    metrics::record_api_request(
        &endpoint,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        running_harvests: state.harvester.running(),
        providers: state.harvester.providers().names(),
    }))
}

async fn start_harvest(
    State(state): State<AppState>,
    Json(request): Json<HarvestRequest>,
) -> Response {
    match state.harvester.start_harvest(request) {
        Ok(session_id) => (
            StatusCode::ACCEPTED,
            Json(ApiResponse::success(StartedResponse { session_id })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn get_progress(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.harvester.get_progress(&session_id) {
        Some(snapshot) => Json(ApiResponse::success(snapshot)).into_response(),
        None => not_found(format!("No progress for session: {session_id}")),
    }
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.harvester.get_session(&session_id) {
        Ok(Some(session)) => Json(ApiResponse::success(session)).into_response(),
        Ok(None) => not_found(format!("Session not found: {session_id}")),
        Err(e) => error_response(&e),
    }
}

async fn get_stats(State(state): State<AppState>) -> Response {
    match state.harvester.get_stats() {
        Ok(stats) => Json(ApiResponse::success(stats)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_records(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> Response {
    match state.harvester.list_records(&filter) {
        Ok(records) => Json(ApiResponse::success(records)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn clear_all(State(state): State<AppState>) -> Response {
    match state.harvester.clear_all() {
        Ok(summary) => Json(ApiResponse::success(summary)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn test_provider(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<CheckParams>,
) -> Response {
    match state
        .harvester
        .test_provider(&name, params.server.as_deref())
        .await
    {
        Ok(check) => Json(ApiResponse::success(check)).into_response(),
        Err(Error::Config(message)) => not_found(message),
        Err(e) => error_response(&e),
    }
}

async fn metrics_text() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response(),
    }
}

// ============================================================================
// Tests
// ============================================================================
