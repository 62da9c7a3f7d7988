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

// HTTP/JSON surface of the control service

use axum::{
    error_handling::HandleErrorLayer,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    BoxError, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod handlers;
pub mod responses;

use crate::config::Config;
use crate::engine_core::constants::limits::MAX_RPC_BODY_BYTES;
use crate::service::ControlService;
use responses::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: ControlService,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(service: ControlService, config: Arc<Config>) -> Self {
        Self { service, config }
    }
}

/// Build the router.
///
/// Layers, outermost first: timeout (mapped to 408), request tracing, body
/// size limit.
pub fn create_router(state: AppState) -> Router {
    let timeout = state.config.request_timeout();

    let routes = Router::new()
        .route("/v1/taint/report", post(handlers::report_taint_handler))
        .route("/v1/intent", post(handlers::declare_intent_handler))
        .route("/v1/policy", get(handlers::get_policy_handler))
        .route("/v1/agents/register", post(handlers::register_agent_handler))
        .route("/v1/agents/unregister", post(handlers::unregister_agent_handler))
        .route("/v1/agents/:pid/taint", get(handlers::get_taint_level_handler))
        .route("/v1/agents/:pid/exec", get(handlers::check_exec_handler))
        .route("/v1/agents/:pid/clear", post(handlers::clear_taint_handler))
        .route("/v1/views/map", post(handlers::map_view_handler))
        .route("/v1/state", get(handlers::state_handler))
        .route("/health", get(handlers::health_handler))
        .with_state(state);

    routes
        .layer(RequestBodyLimitLayer::new(MAX_RPC_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|e: BoxError| async move {
                    if e.is::<tower::timeout::error::Elapsed>() {
                        ApiError::new(StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
                            .into_response()
                    } else {
                        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                            .into_response()
                    }
                }))
                .timeout(timeout),
        )
}
