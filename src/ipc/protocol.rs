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

//! Telos Core wire messages.
//!
//! Request: `{"command": "<CMD>", "data": {...}}` followed by `\n`.
//! Response: `{"success": bool, "error"?: string, "data"?: any}` followed by `\n`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine_core::constants::core_protocol::MAX_COMM_BYTES;
use crate::engine_core::models::TaintLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreCommand {
    UpdateTaint { pid: u32, taint_level: TaintLevel },
    ClearTaint { pid: u32 },
    RegisterAgent { pid: u32, comm: String },
    // Braced so the payload serializes as `{}` rather than being omitted.
    GetState {},
    Ping {},
}

impl CoreCommand {
    pub fn register_agent(pid: u32, comm: &str) -> Self {
        CoreCommand::RegisterAgent {
            pid,
            comm: truncate_comm(comm).to_string(),
        }
    }

    /// Wire name, for logging.
    pub fn name(&self) -> &'static str {
        use crate::engine_core::constants::core_protocol::*;
        match self {
            CoreCommand::UpdateTaint { .. } => CMD_UPDATE_TAINT,
            CoreCommand::ClearTaint { .. } => CMD_CLEAR_TAINT,
            CoreCommand::RegisterAgent { .. } => CMD_REGISTER_AGENT,
            CoreCommand::GetState {} => CMD_GET_STATE,
            CoreCommand::Ping {} => CMD_PING,
        }
    }
}

/// Longest prefix of `comm` that fits in `MAX_COMM_BYTES` without splitting
/// a UTF-8 sequence.
pub fn truncate_comm(comm: &str) -> &str {
    if comm.len() <= MAX_COMM_BYTES {
        return comm;
    }
    let mut end = MAX_COMM_BYTES;
    while !comm.is_char_boundary(end) {
        end -= 1;
    }
    &comm[..end]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
