/// REST API routes for agent-trail.
///
/// Handlers authenticate the org, call into the pipeline/worker/verify
/// core, and translate outcomes into JSON. Nothing below this layer
/// knows it is behind HTTP.
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::auth::{error_response, AuthOrg, ErrorResponse};
use super::AppState;
use crate::error::TrailError;
use crate::pipeline;
use crate::state::models::ExecutionRecord;
use crate::verify;
use crate::worker::DispatchOutcome;

// ─── Health ──────────────────────────────────────────────

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

// ─── Executions ──────────────────────────────────────────

/// Request to execute an automation goal.
#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Receipt returned while the anchor is still pending.
#[derive(Debug, Serialize)]
struct ExecuteResponse {
    receipt_id: Uuid,
    status: String,
    poa_hash: String,
    result_json: Value,
    streaming_url: Option<String>,
}

/// POST /api/execute — Run an agent and record its proof.
async fn execute(
    auth: AuthOrg,
    State(state): State<Arc<AppState>>,
    body: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Json(req) = body
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid JSON body"))?;

    let goal = req.goal.filter(|g| !g.is_empty());
    let url = req.url.filter(|u| !u.is_empty());
    let (Some(goal), Some(url)) = (goal, url) else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields: goal, url",
        ));
    };

    let run = pipeline::run_and_record(
        state.store.as_ref(),
        state.engine.as_ref(),
        &state.worker,
        auth.org_id,
        &goal,
        &url,
    )
    .await
    .map_err(|e| {
        let status = match e {
            TrailError::Engine(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, &e.to_string())
    })?;

    Ok(Json(ExecuteResponse {
        receipt_id: run.record.id,
        status: "pending".to_string(),
        poa_hash: run.record.poa_hash,
        result_json: run.record.result_json.unwrap_or_else(|| serde_json::json!({})),
        streaming_url: run.streaming_url,
    }))
}

/// GET /api/executions — Latest 50 executions for the authenticated org.
async fn list_executions(
    auth: AuthOrg,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ExecutionRecord>>, (StatusCode, Json<ErrorResponse>)> {
    let records = state
        .store
        .list_executions(auth.org_id, 50)
        .await
        .map_err(|e| {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to list executions: {e}"),
            )
        })?;

    Ok(Json(records))
}

/// Load a record and hide it unless it belongs to the caller's org.
async fn load_org_execution(
    state: &AppState,
    auth: &AuthOrg,
    id: Uuid,
) -> Result<ExecutionRecord, (StatusCode, Json<ErrorResponse>)> {
    state
        .store
        .get_execution(id)
        .await
        .map_err(|e| {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to load execution: {e}"),
            )
        })?
        .filter(|r| r.org_id == auth.org_id)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Execution not found"))
}

/// GET /api/executions/{id} — Single record, org-scoped.
async fn get_execution(
    auth: AuthOrg,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExecutionRecord>, (StatusCode, Json<ErrorResponse>)> {
    let record = load_org_execution(&state, &auth, id).await?;
    Ok(Json(record))
}

/// Anchor retry response.
#[derive(Debug, Serialize)]
struct RetryResponse {
    status: &'static str,
}

/// POST /api/executions/{id}/anchor — Queue another anchor attempt.
async fn retry_anchor(
    auth: AuthOrg,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RetryResponse>, (StatusCode, Json<ErrorResponse>)> {
    // A foreign record is indistinguishable from a missing one.
    load_org_execution(&state, &auth, id).await?;

    match state.worker.dispatch(id).await {
        DispatchOutcome::Queued => Ok(Json(RetryResponse { status: "queued" })),
        DispatchOutcome::AlreadyInFlight => Err(error_response(
            StatusCode::CONFLICT,
            "Anchor attempt already in flight",
        )),
        DispatchOutcome::Saturated => Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Anchor queue is full, try again later",
        )),
    }
}

pub fn execution_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/execute", post(execute))
        .route("/api/executions", get(list_executions))
        .route("/api/executions/{id}", get(get_execution))
        .route("/api/executions/{id}/anchor", post(retry_anchor))
}

// ─── Verification ────────────────────────────────────────

/// POST /api/verify/{id} — Public triple verification of a receipt.
///
/// Deliberately unauthenticated: anyone holding a receipt id can check
/// it. Chain-side failures come back inside the result body; only an
/// unknown id is a 404.
async fn verify_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<verify::VerificationResult>, (StatusCode, Json<ErrorResponse>)> {
    match verify::verify_execution(state.store.as_ref(), state.gateway.as_ref(), id).await {
        Ok(result) => Ok(Json(result)),
        Err(TrailError::NotFound(_)) => {
            Err(error_response(StatusCode::NOT_FOUND, "Execution not found"))
        }
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Verification failed: {e}"),
        )),
    }
}

pub fn verify_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/verify/{id}", post(verify_receipt))
}
