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

// Request and response records of the control service

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine_core::models::{GuardianSnapshot, TaintLevel};
use crate::ipc::ChannelState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaintReport {
    pub source_id: String,
    #[serde(default)]
    pub url: String,
    pub level: TaintLevel,
    #[serde(default)]
    pub payload_preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    pub agent_pid: u32,
    #[serde(default)]
    pub natural_language_goal: String,
    #[serde(default)]
    pub planned_actions: Vec<String>,
}

/// Advisory verdict for a declared intent. `policy_ttl_ms` bounds how long
/// the caller may cache it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentVerdict {
    pub allowed: bool,
    pub reason: String,
    pub policy_ttl_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRules {
    pub max_allowed_taint: TaintLevel,
    pub allowed_ips: Vec<String>,
    pub allowed_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaintLevelResponse {
    pub pid: u32,
    pub taint_level: TaintLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecVerdict {
    pub pid: u32,
    pub taint_level: TaintLevel,
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAgentRequest {
    pub pid: u32,
    /// Process name sent to the daemon; read from procfs when absent.
    #[serde(default)]
    pub comm: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnregisterAgentRequest {
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapViewRequest {
    pub source_id: String,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResponse {
    pub guardian: GuardianSnapshot,
    pub channel: ChannelState,
    /// Daemon `GET_STATE` payload, `null` when unreachable
    pub core: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreMode {
    Connected,
    Standalone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub core: CoreMode,
    pub channel: ChannelState,
    pub agents: usize,
    pub version: String,
}
