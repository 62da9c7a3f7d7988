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

//! Guardian: the taint/agent state store and the PID bridge.
//!
//! The Guardian owns every piece of mutable control-plane state: registered
//! agents, the latest taint record per browser view, and the view-to-agent
//! bindings. All multi-step operations run under a single write-lock
//! acquisition so concurrent RPC handlers cannot interleave them.
//!
//! PID bridge: browser views do not announce their owning process. A view is
//! attributed to an explicitly mapped agent if there is one, otherwise to the
//! currently active agent (the most recently registered), and that inference
//! is memoized so the view keeps its owner even when another agent becomes
//! active later.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::engine_core::errors::CortexError;
use crate::engine_core::models::{AgentInfo, GuardianSnapshot, Policy, TaintLevel, TaintRecord, TaintUpdate};

/// Answers whether an OS process still exists.
pub trait LivenessProbe {
    fn is_alive(&self, pid: u32) -> bool;
}

impl<F> LivenessProbe for F
where
    F: Fn(u32) -> bool,
{
    fn is_alive(&self, pid: u32) -> bool {
        self(pid)
    }
}

#[derive(Debug, Default)]
struct GuardianState {
    agents: HashMap<u32, AgentInfo>,
    active_agent_pid: Option<u32>,
    taint_records: HashMap<String, TaintRecord>,
    view_agent_map: HashMap<String, u32>,
    next_seq: u64,
}

impl GuardianState {
    fn register(&mut self, pid: u32) -> bool {
        if self.agents.contains_key(&pid) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.agents.insert(pid, AgentInfo::new(pid, seq));
        self.active_agent_pid = Some(pid);
        true
    }

    fn unregister(&mut self, pid: u32) -> bool {
        if self.agents.remove(&pid).is_none() {
            return false;
        }

        if self.active_agent_pid == Some(pid) {
            self.active_agent_pid = self
                .agents
                .values()
                .max_by_key(|agent| agent.registration_seq)
                .map(|agent| agent.pid);
        }

        self.view_agent_map.retain(|_, mapped| *mapped != pid);
        true
    }

    fn resolve(&mut self, source_id: &str) -> Option<u32> {
        if let Some(pid) = self.view_agent_map.get(source_id) {
            return Some(*pid);
        }

        let pid = self.active_agent_pid?;
        self.view_agent_map.insert(source_id.to_string(), pid);
        if let Some(agent) = self.agents.get_mut(&pid) {
            agent.active_views.insert(source_id.to_string());
        }
        debug!(source_id, pid, "View implicitly bound to active agent");
        Some(pid)
    }
}

pub struct Guardian {
    policy: Arc<Policy>,
    state: RwLock<GuardianState>,
}

impl Guardian {
    pub fn new(policy: Arc<Policy>) -> Self {
        info!(
            max_taint_for_exec = %policy.max_taint_for_exec,
            "Guardian initialized"
        );
        Self {
            policy,
            state: RwLock::new(GuardianState::default()),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    fn read(&self) -> RwLockReadGuard<'_, GuardianState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GuardianState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // === AGENT REGISTRY ===

    /// Register an agent process. The newest agent becomes the active one.
    /// Returns `true` when the agent was not known before.
    pub fn register_agent(&self, pid: u32) -> bool {
        let created = self.write().register(pid);
        if created {
            info!(pid, "Agent registered");
        } else {
            debug!(pid, "Agent already registered");
        }
        created
    }

    /// Unregister an agent. Returns `false` if the PID is unknown.
    pub fn unregister_agent(&self, pid: u32) -> bool {
        let mut state = self.write();
        let removed = state.unregister(pid);
        if removed {
            info!(pid, active_agent = ?state.active_agent_pid, "Agent unregistered");
        }
        removed
    }

    pub fn active_agent(&self) -> Option<u32> {
        self.read().active_agent_pid
    }

    pub fn is_registered(&self, pid: u32) -> bool {
        self.read().agents.contains_key(&pid)
    }

    pub fn agent_count(&self) -> usize {
        self.read().agents.len()
    }

    // === TAINT MANAGEMENT ===

    /// Overwrite the taint record for a view, then escalate the owning agent.
    /// Taint never decreases through this path.
    pub fn update_taint(&self, source_id: &str, level: TaintLevel, url: &str) -> TaintUpdate {
        let mut state = self.write();
        state.taint_records.insert(
            source_id.to_string(),
            TaintRecord {
                source_id: source_id.to_string(),
                level,
                url: url.to_string(),
                observed_at: Utc::now(),
            },
        );

        let agent_pid = state.resolve(source_id);
        let Some(agent) = agent_pid.and_then(|pid| state.agents.get_mut(&pid)) else {
            return TaintUpdate {
                agent_pid: None,
                escalated: false,
                agent_level: TaintLevel::Clean,
            };
        };

        let escalated = level > agent.taint_level;
        if escalated {
            agent.taint_level = level;
            warn!(pid = agent.pid, source_id, level = %level, "Agent taint escalated");
        }

        TaintUpdate {
            agent_pid,
            escalated,
            agent_level: agent.taint_level,
        }
    }

    /// Current level of an agent. Unknown processes are treated as CLEAN.
    pub fn get_taint_level(&self, pid: u32) -> TaintLevel {
        self.read()
            .agents
            .get(&pid)
            .map(|agent| agent.taint_level)
            .unwrap_or(TaintLevel::Clean)
    }

    /// Reset an agent to CLEAN. Returns `false` if the PID is unknown.
    pub fn clear_taint(&self, pid: u32) -> bool {
        match self.write().agents.get_mut(&pid) {
            Some(agent) => {
                agent.taint_level = TaintLevel::Clean;
                info!(pid, "Taint cleared for agent");
                true
            }
            None => false,
        }
    }

    pub fn taint_record(&self, source_id: &str) -> Option<TaintRecord> {
        self.read().taint_records.get(source_id).cloned()
    }

    // === PID BRIDGE ===

    /// Resolve which agent is accountable for a view, memoizing an implicit
    /// binding to the active agent.
    pub fn resolve_agent_for_view(&self, source_id: &str) -> Option<u32> {
        self.write().resolve(source_id)
    }

    /// Explicitly bind a view to an agent, overriding any earlier binding.
    pub fn map_view_to_agent(&self, source_id: &str, pid: u32) -> Result<(), CortexError> {
        let mut state = self.write();
        let Some(agent) = state.agents.get_mut(&pid) else {
            warn!(source_id, pid, "Cannot map view to unknown agent");
            return Err(CortexError::UnknownAgent(pid));
        };
        agent.active_views.insert(source_id.to_string());
        let previous = state.view_agent_map.insert(source_id.to_string(), pid);
        if let Some(old) = previous.filter(|old| *old != pid) {
            if let Some(old_agent) = state.agents.get_mut(&old) {
                old_agent.active_views.remove(source_id);
            }
        }
        debug!(source_id, pid, previous = ?previous, "View mapped to agent");
        Ok(())
    }

    // === LIVENESS ===

    /// Unregister every agent whose process no longer exists.
    ///
    /// Liveness is checked and agents removed under one write lock, so an
    /// agent registered while the sweep runs is never removed by it.
    pub fn reap_dead_agents(&self, probe: &dyn LivenessProbe) -> Vec<u32> {
        let mut state = self.write();
        let mut reaped: Vec<u32> = state
            .agents
            .keys()
            .copied()
            .filter(|pid| !probe.is_alive(*pid))
            .collect();
        reaped.sort_unstable();
        reaped.retain(|pid| state.unregister(*pid));
        let active_agent = state.active_agent_pid;
        drop(state);

        for pid in &reaped {
            warn!(pid, ?active_agent, "Reaped agent whose process has exited");
        }
        reaped
    }

    // === DEBUG ===

    pub fn snapshot(&self) -> GuardianSnapshot {
        let state = self.read();
        GuardianSnapshot {
            agents: state.agents.iter().map(|(pid, a)| (*pid, a.clone())).collect(),
            active_agent: state.active_agent_pid,
            taint_records: state
                .taint_records
                .iter()
                .map(|(id, r)| (id.clone(), r.clone()))
                .collect(),
            view_agent_map: state
                .view_agent_map
                .iter()
                .map(|(id, pid)| (id.clone(), *pid))
                .collect(),
        }
    }
}
