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

// Domain error types for the control plane

use thiserror::Error;

/// Main error type for the control plane
#[derive(Error, Debug)]
pub enum CortexError {
    /// Configuration error (bad env var, bad CLI value)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Policy document could not be parsed or failed validation
    #[error("Policy error: {0}")]
    PolicyError(String),

    /// Referenced agent is not registered
    #[error("Unknown agent: PID {0}")]
    UnknownAgent(u32),

    /// Enforcement channel failure
    #[error("Enforcement channel error: {0}")]
    Channel(#[from] crate::ipc::ChannelError),

    /// I/O Error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CortexError {
    /// Get user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            CortexError::ConfigurationError(_) => "Internal error".to_string(),
            CortexError::PolicyError(_) => "Internal error".to_string(),
            CortexError::UnknownAgent(pid) => format!("Unknown agent {}", pid),
            CortexError::Channel(_) => "Enforcement daemon unavailable".to_string(),
            CortexError::IoError(_) => "Internal system error".to_string(),
        }
    }

    /// HTTP status code used when the error crosses the RPC surface.
    pub fn status_code(&self) -> u16 {
        match self {
            CortexError::ConfigurationError(_) | CortexError::PolicyError(_) => 500,
            CortexError::UnknownAgent(_) => 404,
            CortexError::Channel(_) => 503,
            CortexError::IoError(_) => 500,
        }
    }
}
