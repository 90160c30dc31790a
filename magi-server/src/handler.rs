use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use magi_core::WeightSet;
use magi_engine::{AnalysisInput, ConsensusResponse, PanelAnalysis};
use magi_services::SecurityStatus;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::protocol::{validate_analysis, ConsensusRequest, HealthResponse, WeightsRequest};
use crate::server::AppState;

/// `POST /api/consensus`
pub async fn consensus(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ConsensusRequest>, JsonRejection>,
) -> Result<Json<ConsensusResponse>, ApiError> {
    let Json(request) = payload?;
    let (prompt, mode) = request.validate()?;

    tracing::debug!("Consensus request: mode={}, {} chars", mode, prompt.chars().count());

    let response = state
        .orchestrator
        .run_consensus(&prompt, mode)
        .await
        .map_err(ApiError::JudgeFailed)?;

    Ok(Json(response))
}

/// `POST /api/analyze`
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalysisInput>, JsonRejection>,
) -> Result<Json<PanelAnalysis>, ApiError> {
    let Json(input) = payload?;
    let input = validate_analysis(input)?;

    let analysis = state
        .orchestrator
        .run_panel_analysis(&state.parser, &input)
        .await;

    tracing::info!(
        "Panel analysis of {}: {}/{} units answered",
        analysis.symbol,
        analysis.valid_count(),
        analysis.results.len()
    );
    Ok(Json(analysis))
}

/// `GET /api/providers/health`
pub async fn providers_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let reports = state.orchestrator.health_check_all().await;

    let mut units = Map::new();
    for (unit, report) in reports {
        units.insert(unit, json!(report));
    }
    Json(Value::Object(units))
}

/// `GET /api/weights`
pub async fn get_weights(State(state): State<Arc<AppState>>) -> Json<WeightSet> {
    Json(state.weights.snapshot())
}

/// `PUT /admin/weights`
pub async fn put_weights(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WeightsRequest>, JsonRejection>,
) -> Result<Json<WeightSet>, ApiError> {
    let Json(request) = payload?;
    let updated = state.weights.replace(request.weights, Utc::now())?;
    Ok(Json(updated))
}

/// `GET /admin/security/status`
pub async fn security_status(State(state): State<Arc<AppState>>) -> Json<SecurityStatus> {
    Json(state.gate.status(state.config.status_top_n, Utc::now()))
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        context_loaded: state.orchestrator.has_reference_context(),
        timestamp: Utc::now(),
    })
}

/// `GET /status`: which units have a provider
pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut body = Map::new();
    for slot in state.orchestrator.slots() {
        body.insert(slot.unit.clone(), Value::Bool(slot.is_configured()));
    }
    body.insert("judge".to_string(), json!(state.orchestrator.judge_unit()));
    body.insert(
        "context".to_string(),
        Value::Bool(state.orchestrator.has_reference_context()),
    );
    Json(Value::Object(body))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
