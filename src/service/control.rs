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

//! Control service.
//!
//! Glues the Guardian, the policy evaluator and the enforcement channel
//! together. Guardian locks are never held across an enforcement push: each
//! operation updates the store first, then talks to the daemon.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::messages::*;
use crate::engine::evaluator::PolicyEvaluator;
use crate::engine_core::audit::AuditLogger;
use crate::engine_core::constants::service::*;
use crate::engine_core::errors::CortexError;
use crate::engine_core::guardian::Guardian;
use crate::engine_core::models::Decision;
use crate::ipc::{ChannelState, EnforcementChannel};
use crate::utils::process::read_comm;

#[derive(Clone)]
pub struct ControlService {
    guardian: Arc<Guardian>,
    channel: Arc<dyn EnforcementChannel>,
    audit: AuditLogger,
}

impl ControlService {
    pub fn new(guardian: Arc<Guardian>, channel: Arc<dyn EnforcementChannel>) -> Self {
        Self {
            guardian,
            channel,
            audit: AuditLogger::new(),
        }
    }

    pub fn guardian(&self) -> &Arc<Guardian> {
        &self.guardian
    }

    pub fn channel(&self) -> &Arc<dyn EnforcementChannel> {
        &self.channel
    }

    /// Record a taint observation and enforce it on the owning agent when it
    /// reaches HIGH.
    pub async fn report_taint(&self, report: TaintReport) -> Ack {
        let TaintReport {
            source_id,
            url,
            level,
            payload_preview,
        } = report;

        info!(source_id = %source_id, level = %level, url = %url, "Taint report received");
        if !payload_preview.is_empty() {
            let preview: String = payload_preview.chars().take(PREVIEW_LOG_CHARS).collect();
            debug!(source_id = %source_id, preview = %preview, "Payload preview");
        }

        let update = self.guardian.update_taint(&source_id, level, &url);

        let Some(pid) = update.agent_pid else {
            warn!(source_id = %source_id, "No agent mapped for source");
            self.audit.log(
                "taint_report",
                json!({"source_id": source_id, "level": level, "agent_pid": null, "enforced": false}),
            );
            return Ack::ok(MSG_NO_AGENT_MAPPED);
        };

        if !level.requires_enforcement() {
            self.audit.log(
                "taint_report",
                json!({"source_id": source_id, "level": level, "agent_pid": pid, "enforced": false}),
            );
            return Ack::ok(MSG_TAINT_RECORDED);
        }

        let ack = match self.channel.update_taint(pid, level).await {
            Ok(()) => {
                info!(pid, level = %level, source_id = %source_id, "Taint enforced on agent");
                Ack::ok(format!("Agent {} taint updated to {}", pid, level.name()))
            }
            Err(e) => {
                error!(pid, source_id = %source_id, error = %e, "Failed to enforce taint");
                Ack::failed(format!("{}: {}", MSG_CORE_IPC_FAILED, e))
            }
        };

        self.audit.log(
            "taint_report",
            json!({
                "source_id": source_id,
                "level": level,
                "agent_pid": pid,
                "agent_level": update.agent_level,
                "enforced": ack.success,
            }),
        );
        ack
    }

    /// Register the agent locally and return an advisory verdict.
    pub fn declare_intent(&self, request: IntentRequest) -> IntentVerdict {
        info!(
            pid = request.agent_pid,
            goal = %request.natural_language_goal,
            actions = request.planned_actions.len(),
            "Intent declared"
        );
        self.guardian.register_agent(request.agent_pid);

        let verdict = IntentVerdict {
            allowed: true,
            reason: MSG_INTENT_NOTED.to_string(),
            policy_ttl_ms: INTENT_POLICY_TTL_MS,
        };
        self.audit.log(
            "intent_declared",
            json!({
                "agent_pid": request.agent_pid,
                "goal": request.natural_language_goal,
                "planned_actions": request.planned_actions,
                "allowed": verdict.allowed,
            }),
        );
        verdict
    }

    /// Static policy rules. The PID is accepted for future per-agent rules
    /// and is currently only logged.
    pub fn get_policy(&self, pid: u32) -> PolicyRules {
        let policy = self.guardian.policy();
        debug!(pid, "Policy requested");
        self.audit.log("policy_requested", json!({"pid": pid}));
        PolicyRules {
            max_allowed_taint: policy.max_taint_for_exec,
            allowed_ips: policy.allowed_ips.clone(),
            allowed_paths: policy.allowed_paths.clone(),
        }
    }

    pub fn get_taint_level(&self, pid: u32) -> TaintLevelResponse {
        let taint_level = self.guardian.get_taint_level(pid);
        self.audit
            .log("taint_queried", json!({"pid": pid, "taint_level": taint_level}));
        TaintLevelResponse { pid, taint_level }
    }

    pub fn check_exec(&self, pid: u32) -> ExecVerdict {
        let taint_level = self.guardian.get_taint_level(pid);
        let decision = PolicyEvaluator::evaluate_exec(&self.guardian, pid);
        let (blocked, reason) = match decision {
            Decision::Allowed => (false, None),
            Decision::Denied { reason } => (true, Some(reason)),
        };
        self.audit.log(
            "exec_checked",
            json!({"pid": pid, "taint_level": taint_level, "blocked": blocked}),
        );
        ExecVerdict {
            pid,
            taint_level,
            blocked,
            reason,
        }
    }

    /// Register an agent and announce it to the daemon. A failed
    /// announcement does not undo the registration.
    pub async fn register_agent(&self, request: RegisterAgentRequest) -> Ack {
        let pid = request.pid;
        if !self.guardian.register_agent(pid) {
            self.audit
                .log("agent_registered", json!({"pid": pid, "created": false}));
            return Ack::ok(format!("Agent {} already registered", pid));
        }

        let comm = request
            .comm
            .filter(|c| !c.is_empty())
            .or_else(|| read_comm(pid))
            .unwrap_or_default();

        let (message, announced) = match self.channel.register_agent(pid, &comm).await {
            Ok(()) => (format!("Agent {} registered", pid), true),
            Err(e) => {
                warn!(pid, comm = %comm, error = %e, "Agent registered locally only");
                (
                    format!("Agent {} registered; {}: {}", pid, MSG_CORE_IPC_FAILED, e),
                    false,
                )
            }
        };
        self.audit.log(
            "agent_registered",
            json!({"pid": pid, "comm": comm, "created": true, "announced": announced}),
        );
        Ack::ok(message)
    }

    /// Remove an agent and release its daemon-side taint.
    pub async fn unregister_agent(&self, request: UnregisterAgentRequest) -> Ack {
        let pid = request.pid;
        if !self.guardian.unregister_agent(pid) {
            self.audit
                .log("agent_unregistered", json!({"pid": pid, "known": false}));
            return Ack::failed(CortexError::UnknownAgent(pid).user_message());
        }

        let released = match self.channel.clear_taint(pid).await {
            Ok(()) => true,
            Err(e) => {
                warn!(pid, error = %e, "Daemon taint not released for unregistered agent");
                false
            }
        };
        self.audit.log(
            "agent_unregistered",
            json!({"pid": pid, "known": true, "released": released}),
        );
        Ack::ok(format!("Agent {} unregistered", pid))
    }

    /// Reset an agent to CLEAN locally and on the daemon.
    pub async fn clear_taint(&self, pid: u32) -> Ack {
        if !self.guardian.clear_taint(pid) {
            self.audit
                .log("taint_cleared", json!({"pid": pid, "known": false}));
            return Ack::failed(CortexError::UnknownAgent(pid).user_message());
        }

        let ack = match self.channel.clear_taint(pid).await {
            Ok(()) => Ack::ok(format!("Agent {} taint cleared", pid)),
            Err(e) => {
                error!(pid, error = %e, "Failed to clear taint on daemon");
                Ack::failed(format!("{}: {}", MSG_CORE_IPC_FAILED, e))
            }
        };
        self.audit.log(
            "taint_cleared",
            json!({"pid": pid, "known": true, "enforced": ack.success}),
        );
        ack
    }

    pub fn map_view(&self, request: MapViewRequest) -> Ack {
        let MapViewRequest { source_id, pid } = request;
        let ack = match self.guardian.map_view_to_agent(&source_id, pid) {
            Ok(()) => Ack::ok(format!("View {} mapped to agent {}", source_id, pid)),
            Err(e) => Ack::failed(e.user_message()),
        };
        self.audit.log(
            "view_mapped",
            json!({"source_id": source_id, "pid": pid, "success": ack.success}),
        );
        ack
    }

    /// Local snapshot plus whatever the daemon reports about itself.
    pub async fn state(&self) -> StateResponse {
        let guardian = self.guardian.snapshot();
        let core = match self.channel.get_state().await {
            Ok(data) => Some(data),
            Err(e) => {
                debug!(error = %e, "Daemon state unavailable");
                None
            }
        };
        self.audit.log(
            "state_requested",
            json!({"agents": guardian.agents.len(), "core_available": core.is_some()}),
        );
        StateResponse {
            guardian,
            channel: self.channel.state(),
            core,
        }
    }

    pub async fn health(&self) -> HealthResponse {
        let core = match self.channel.ping().await {
            Ok(()) => CoreMode::Connected,
            Err(e) => {
                debug!(error = %e, "Daemon ping failed, running standalone");
                CoreMode::Standalone
            }
        };
        let channel: ChannelState = self.channel.state();
        self.audit
            .log("health_checked", json!({"core": core, "channel": channel}));
        HealthResponse {
            status: "ok".to_string(),
            core,
            channel,
            agents: self.guardian.agent_count(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
