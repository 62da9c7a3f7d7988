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

use crate::engine_core::constants::{config as keys, defaults};
use crate::engine_core::errors::CortexError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected text or json)", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Runtime configuration, read from the environment and then overlaid with
/// command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // RPC listener
    pub bind_address: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub shutdown_grace_secs: u64,

    // Enforcement daemon
    pub socket_path: PathBuf,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,

    pub policy_path: PathBuf,
    /// Zero disables the stale-agent reaper.
    pub reap_interval_secs: u64,

    pub log_level: String,
    pub log_format: LogFormat,
}

/// Values supplied on the command line. `None` keeps the environment value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub socket_path: Option<PathBuf>,
    pub policy_path: Option<PathBuf>,
    pub log_format: Option<LogFormat>,
    pub reap_interval_secs: Option<u64>,
    pub debug: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, CortexError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset keys take their
    /// defaults; set but unparsable values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CortexError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            bind_address: string_or(keys::ENV_BIND_ADDRESS, defaults::BIND_ADDRESS),
            port: parse_or(&lookup, keys::ENV_PORT, defaults::RPC_PORT)?,
            request_timeout_secs: parse_or(
                &lookup,
                keys::ENV_REQUEST_TIMEOUT_SECS,
                defaults::REQUEST_TIMEOUT_SECS,
            )?,
            shutdown_grace_secs: parse_or(
                &lookup,
                keys::ENV_SHUTDOWN_GRACE_SECS,
                defaults::SHUTDOWN_GRACE_SECS,
            )?,
            socket_path: PathBuf::from(string_or(keys::ENV_SOCKET_PATH, defaults::SOCKET_PATH)),
            connect_timeout_ms: parse_or(
                &lookup,
                keys::ENV_CONNECT_TIMEOUT_MS,
                defaults::CONNECT_TIMEOUT_MS,
            )?,
            read_timeout_ms: parse_or(&lookup, keys::ENV_READ_TIMEOUT_MS, defaults::READ_TIMEOUT_MS)?,
            policy_path: PathBuf::from(string_or(keys::ENV_POLICY_PATH, defaults::POLICY_PATH)),
            reap_interval_secs: parse_or(
                &lookup,
                keys::ENV_REAP_INTERVAL_SECS,
                defaults::REAP_INTERVAL_SECS,
            )?,
            log_level: string_or(keys::ENV_LOG_LEVEL, defaults::LOG_LEVEL),
            log_format: parse_or(&lookup, keys::ENV_LOG_FORMAT, LogFormat::Text)?,
        })
    }

    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(bind) = overrides.bind_address {
            self.bind_address = bind;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(socket) = overrides.socket_path {
            self.socket_path = socket;
        }
        if let Some(policy) = overrides.policy_path {
            self.policy_path = policy;
        }
        if let Some(format) = overrides.log_format {
            self.log_format = format;
        }
        if let Some(interval) = overrides.reap_interval_secs {
            self.reap_interval_secs = interval;
        }
        if overrides.debug {
            self.log_level = "debug".to_string();
        }
        self
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn reap_interval(&self) -> Option<Duration> {
        (self.reap_interval_secs > 0).then(|| Duration::from_secs(self.reap_interval_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: defaults::BIND_ADDRESS.to_string(),
            port: defaults::RPC_PORT,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            shutdown_grace_secs: defaults::SHUTDOWN_GRACE_SECS,
            socket_path: PathBuf::from(defaults::SOCKET_PATH),
            connect_timeout_ms: defaults::CONNECT_TIMEOUT_MS,
            read_timeout_ms: defaults::READ_TIMEOUT_MS,
            policy_path: PathBuf::from(defaults::POLICY_PATH),
            reap_interval_secs: defaults::REAP_INTERVAL_SECS,
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: LogFormat::Text,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, CortexError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            CortexError::ConfigurationError(format!("{}='{}' is invalid: {}", key, raw, e))
        }),
    }
}
