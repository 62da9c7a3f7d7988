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

//! telos-cortex Constants - Single source of truth for all configuration values.
//!
//! This module centralizes wire strings, defaults and limits so the control
//! plane and its tests agree on them.

/// Enforcement daemon wire protocol
pub mod core_protocol {
    pub const CMD_UPDATE_TAINT: &str = "UPDATE_TAINT";
    pub const CMD_CLEAR_TAINT: &str = "CLEAR_TAINT";
    pub const CMD_REGISTER_AGENT: &str = "REGISTER_AGENT";
    pub const CMD_GET_STATE: &str = "GET_STATE";
    pub const CMD_PING: &str = "PING";
    /// The kernel `comm` field is 16 bytes including the trailing NUL.
    pub const MAX_COMM_BYTES: usize = 15;
}

/// Defaults applied when neither CLI nor environment override them
pub mod defaults {
    pub const BIND_ADDRESS: &str = "0.0.0.0";
    pub const RPC_PORT: u16 = 50051;
    pub const SOCKET_PATH: &str = "/var/run/telos.sock";
    pub const POLICY_PATH: &str = "policy.yaml";
    pub const CONNECT_TIMEOUT_MS: u64 = 5_000;
    pub const READ_TIMEOUT_MS: u64 = 10_000;
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const SHUTDOWN_GRACE_SECS: u64 = 5;
    /// Zero disables the stale-agent reaper.
    pub const REAP_INTERVAL_SECS: u64 = 0;
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FORMAT: &str = "text";
}

/// Policy document defaults
pub mod policy {
    pub const DEFAULT_ALLOWED_PATH: &str = "/tmp/*";
}

/// Control service replies
pub mod service {
    /// Advisory TTL handed back with every intent verdict.
    pub const INTENT_POLICY_TTL_MS: u64 = 60_000;
    pub const MSG_NO_AGENT_MAPPED: &str = "Taint recorded, no agent mapped";
    pub const MSG_TAINT_RECORDED: &str = "Taint recorded";
    pub const MSG_CORE_IPC_FAILED: &str = "Core IPC failed";
    pub const MSG_INTENT_NOTED: &str = "Intent noted; verification is not yet intent-aware";
    /// Characters of `payload_preview` echoed into debug logs.
    pub const PREVIEW_LOG_CHARS: usize = 32;
}

/// Configuration Environment Variables
pub mod config {
    pub const ENV_BIND_ADDRESS: &str = "TELOS_BIND_ADDRESS";
    pub const ENV_PORT: &str = "TELOS_PORT";
    pub const ENV_SOCKET_PATH: &str = "TELOS_SOCKET_PATH";
    pub const ENV_POLICY_PATH: &str = "TELOS_POLICY_PATH";
    pub const ENV_CONNECT_TIMEOUT_MS: &str = "TELOS_CONNECT_TIMEOUT_MS";
    pub const ENV_READ_TIMEOUT_MS: &str = "TELOS_READ_TIMEOUT_MS";
    pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TELOS_REQUEST_TIMEOUT_SECS";
    pub const ENV_SHUTDOWN_GRACE_SECS: &str = "TELOS_SHUTDOWN_GRACE_SECS";
    pub const ENV_REAP_INTERVAL_SECS: &str = "TELOS_REAP_INTERVAL_SECS";
    pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
    pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
}

/// Transport Limits (DoS Protection)
pub mod limits {
    /// Maximum accepted enforcement-daemon frame, newline included (64 KiB)
    pub const MAX_CORE_FRAME_BYTES: usize = 64 * 1024;
    /// Maximum accepted RPC request body (64 KiB)
    pub const MAX_RPC_BODY_BYTES: usize = 64 * 1024;
}
