//! HTTP API for the observer engine
//!
//! Exposes health/readiness/metrics alongside the control surface: status,
//! start/stop, anomaly and workflow projections, and approval decisions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use observer_lib::{
    health::{ComponentStatus, HealthRegistry},
    ObserverEngine, ObserverError,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ObserverEngine>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(engine: Arc<ObserverEngine>, health_registry: HealthRegistry) -> Self {
        Self {
            engine,
            health_registry,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct DecisionRequest {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct RunStateResponse {
    status: observer_lib::RunState,
}

fn error_response(e: ObserverError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &e {
        ObserverError::NotFound(_) => StatusCode::NOT_FOUND,
        ObserverError::InvalidTransition { .. } => StatusCode::CONFLICT,
        ObserverError::SourceUnavailable(_) | ObserverError::EmptyResult { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
}

/// Health check - 200 while at least degraded, 503 once unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            e.to_string().into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.status())
}

async fn start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.engine.clone().start();
    Json(RunStateResponse {
        status: state.engine.run_state(),
    })
}

async fn stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.engine.stop();
    Json(RunStateResponse {
        status: state.engine.run_state(),
    })
}

async fn recent_anomalies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    Json(state.engine.recent_anomalies(query.limit.unwrap_or(20)))
}

async fn pending_workflows(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.pending_workflows())
}

async fn approve_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> impl IntoResponse {
    match state.engine.approve(&id, &request.reason).await {
        Ok(workflow) => {
            info!(workflow_id = %id, status = %workflow.status, "Approval handled");
            (StatusCode::OK, Json(workflow)).into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

async fn reject_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> impl IntoResponse {
    match state.engine.reject(&id, &request.reason) {
        Ok(workflow) => (StatusCode::OK, Json(workflow)).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn activity_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    Json(state.engine.activity_feed(query.limit.unwrap_or(50)))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/observer/status", get(status))
        .route("/api/observer/start", post(start))
        .route("/api/observer/stop", post(stop))
        .route("/api/observer/anomalies", get(recent_anomalies))
        .route("/api/observer/workflows/pending", get(pending_workflows))
        .route("/api/observer/workflows/:id/approve", post(approve_workflow))
        .route("/api/observer/workflows/:id/reject", post(reject_workflow))
        .route("/api/observer/activity", get(activity_feed))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
