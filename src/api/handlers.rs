// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Request handlers for API endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::responses::ApiError;
use crate::api::AppState;
use crate::service::messages::*;

#[derive(Debug, Deserialize)]
pub struct PolicyQuery {
    #[serde(default)]
    pub pid: u32,
}

/// `x-request-id` from the caller, or a fresh UUID.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn accept<T, R>(extracted: Result<T, R>, request_id: &str) -> Result<T, ApiError>
where
    ApiError: From<R>,
{
    extracted.map_err(|rejection| {
        let err = ApiError::from(rejection).with_request_id(request_id);
        warn!(request_id = %request_id, status = %err.status, error = %err.message, "Rejected request");
        err
    })
}

/// POST /v1/taint/report
pub async fn report_taint_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TaintReport>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    let request_id = request_id(&headers);
    let Json(report) = accept(payload, &request_id)?;
    info!(request_id = %request_id, source_id = %report.source_id, "ReportTaint");
    Ok(Json(state.service.report_taint(report).await))
}

/// POST /v1/intent
pub async fn declare_intent_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<IntentRequest>, JsonRejection>,
) -> Result<Json<IntentVerdict>, ApiError> {
    let request_id = request_id(&headers);
    let Json(request) = accept(payload, &request_id)?;
    info!(request_id = %request_id, pid = request.agent_pid, "DeclareIntent");
    Ok(Json(state.service.declare_intent(request)))
}

/// GET /v1/policy?pid=N
pub async fn get_policy_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PolicyQuery>, QueryRejection>,
) -> Result<Json<PolicyRules>, ApiError> {
    let request_id = request_id(&headers);
    let Query(query) = accept(query, &request_id)?;
    Ok(Json(state.service.get_policy(query.pid)))
}

/// GET /v1/agents/:pid/taint
pub async fn get_taint_level_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    pid: Result<Path<u32>, PathRejection>,
) -> Result<Json<TaintLevelResponse>, ApiError> {
    let Path(pid) = accept(pid, &request_id(&headers))?;
    Ok(Json(state.service.get_taint_level(pid)))
}

/// GET /v1/agents/:pid/exec
pub async fn check_exec_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    pid: Result<Path<u32>, PathRejection>,
) -> Result<Json<ExecVerdict>, ApiError> {
    let Path(pid) = accept(pid, &request_id(&headers))?;
    Ok(Json(state.service.check_exec(pid)))
}

/// POST /v1/agents/register
pub async fn register_agent_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RegisterAgentRequest>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    let request_id = request_id(&headers);
    let Json(request) = accept(payload, &request_id)?;
    info!(request_id = %request_id, pid = request.pid, "RegisterAgent");
    Ok(Json(state.service.register_agent(request).await))
}

/// POST /v1/agents/unregister
pub async fn unregister_agent_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UnregisterAgentRequest>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    let request_id = request_id(&headers);
    let Json(request) = accept(payload, &request_id)?;
    info!(request_id = %request_id, pid = request.pid, "UnregisterAgent");
    Ok(Json(state.service.unregister_agent(request).await))
}

/// POST /v1/agents/:pid/clear
pub async fn clear_taint_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    pid: Result<Path<u32>, PathRejection>,
) -> Result<Json<Ack>, ApiError> {
    let request_id = request_id(&headers);
    let Path(pid) = accept(pid, &request_id)?;
    info!(request_id = %request_id, pid, "ClearTaint");
    Ok(Json(state.service.clear_taint(pid).await))
}

/// POST /v1/views/map
pub async fn map_view_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<MapViewRequest>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    let request_id = request_id(&headers);
    let Json(request) = accept(payload, &request_id)?;
    info!(request_id = %request_id, source_id = %request.source_id, pid = request.pid, "MapView");
    Ok(Json(state.service.map_view(request)))
}

/// GET /v1/state
pub async fn state_handler(State(state): State<AppState>) -> Json<StateResponse> {
    Json(state.service.state().await)
}

/// GET /health
///
/// Always 200: running without the daemon is degraded, not unhealthy.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.service.health().await)
}
