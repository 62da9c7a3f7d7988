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

//! Enforcement channel.
//!
//! Client side of the line-delimited JSON protocol spoken by the Telos Core
//! daemon over a Unix stream socket. The daemon being absent or crashing is
//! never fatal: every command degrades to a `ChannelError` that callers log
//! and report.

pub mod client;
pub mod codec;
pub mod protocol;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::engine_core::models::TaintLevel;

pub use client::CoreIpcClient;
pub use codec::CoreCodec;
pub use protocol::{CoreCommand, CoreResponse};

/// Connection state of the enforcement channel.
///
/// `Connected` is the only state from which commands are written. Any
/// transport failure drops back to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Error, Debug)]
pub enum ChannelError {
    /// Socket missing, connection refused, permission denied...
    #[error("connect to {path} failed: {source}")]
    ConnectFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("response timed out after {0:?}")]
    ReadTimeout(Duration),

    /// End of stream before a complete newline-terminated frame
    #[error("connection closed by daemon")]
    Closed,

    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Well-formed response with `success: false`
    #[error("daemon rejected command: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// Errors after which the socket can no longer be trusted.
    pub fn is_transport(&self) -> bool {
        !matches!(self, ChannelError::Rejected(_))
    }
}

/// Delivery of enforcement decisions to the privileged daemon.
///
/// Implementations must serialize commands: the wire protocol carries no
/// request identifiers.
#[async_trait]
pub trait EnforcementChannel: Send + Sync {
    async fn update_taint(&self, pid: u32, level: TaintLevel) -> Result<(), ChannelError>;

    async fn clear_taint(&self, pid: u32) -> Result<(), ChannelError>;

    /// `comm` is truncated to the kernel's 15-byte limit.
    async fn register_agent(&self, pid: u32, comm: &str) -> Result<(), ChannelError>;

    /// Daemon-side state for diagnostics.
    async fn get_state(&self) -> Result<serde_json::Value, ChannelError>;

    async fn ping(&self) -> Result<(), ChannelError>;

    /// Drop the connection, if any.
    async fn close(&self);

    fn state(&self) -> ChannelState;
}
