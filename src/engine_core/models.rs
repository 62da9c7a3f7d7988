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

//! Domain models for the control plane.
//!
//! This module contains pure data structures representing taint levels,
//! taint records, registered agents, the exec policy and decisions. It is
//! designed to be free of I/O side effects, with the single exception of
//! `Policy::load` which reads the policy document at startup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::engine_core::constants::policy::DEFAULT_ALLOWED_PATH;
use crate::engine_core::errors::CortexError;
use crate::utils::policy_validator::PolicyValidator;

/// Ordinal taint classification, transmitted as the integers 0-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum TaintLevel {
    #[default]
    Clean = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl TaintLevel {
    pub const ALL: [TaintLevel; 5] = [
        TaintLevel::Clean,
        TaintLevel::Low,
        TaintLevel::Medium,
        TaintLevel::High,
        TaintLevel::Critical,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            TaintLevel::Clean => "CLEAN",
            TaintLevel::Low => "LOW",
            TaintLevel::Medium => "MEDIUM",
            TaintLevel::High => "HIGH",
            TaintLevel::Critical => "CRITICAL",
        }
    }

    /// Levels at or above HIGH are pushed to the enforcement daemon.
    pub fn requires_enforcement(self) -> bool {
        self >= TaintLevel::High
    }
}

impl TryFrom<u8> for TaintLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        TaintLevel::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| format!("taint level {} out of range 0-4", value))
    }
}

impl From<TaintLevel> for u8 {
    fn from(level: TaintLevel) -> Self {
        level.as_u8()
    }
}

impl FromStr for TaintLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u8>() {
            return TaintLevel::try_from(n);
        }
        TaintLevel::ALL
            .iter()
            .copied()
            .find(|level| level.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown taint level '{}'", s))
    }
}

impl fmt::Display for TaintLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Latest observed taint for one content source (browser view).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaintRecord {
    pub source_id: String,
    pub level: TaintLevel,
    /// Advisory only
    pub url: String,
    pub observed_at: DateTime<Utc>,
}

/// An OS process that has identified itself to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub pid: u32,
    pub registered_at: DateTime<Utc>,
    pub taint_level: TaintLevel,
    pub active_views: BTreeSet<String>,
    /// Monotonic registration order, used to promote a new active agent.
    #[serde(skip)]
    pub(crate) registration_seq: u64,
}

impl AgentInfo {
    pub(crate) fn new(pid: u32, registration_seq: u64) -> Self {
        Self {
            pid,
            registered_at: Utc::now(),
            taint_level: TaintLevel::Clean,
            active_views: BTreeSet::new(),
            registration_seq,
        }
    }
}

/// Outcome of `Guardian::update_taint`, computed inside the same critical
/// section as the record update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaintUpdate {
    /// Agent the source resolved to, if any
    pub agent_pid: Option<u32>,
    /// Whether the agent's level was raised by this report
    pub escalated: bool,
    /// Agent level after the update (CLEAN when unresolved)
    pub agent_level: TaintLevel,
}

/// Read-only deep copy of the Guardian state for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianSnapshot {
    pub agents: BTreeMap<u32, AgentInfo>,
    pub active_agent: Option<u32>,
    pub taint_records: BTreeMap<String, TaintRecord>,
    pub view_agent_map: BTreeMap<String, u32>,
}

/// Exec policy loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Strict upper bound: agents above this level may not spawn processes.
    #[serde(deserialize_with = "deserialize_level_lenient")]
    pub max_taint_for_exec: TaintLevel,
    /// IP literals or CIDR blocks
    pub allowed_ips: Vec<String>,
    /// Path globs
    pub allowed_paths: Vec<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_taint_for_exec: TaintLevel::Medium,
            allowed_ips: Vec::new(),
            allowed_paths: vec![DEFAULT_ALLOWED_PATH.to_string()],
        }
    }
}

impl Policy {
    /// Parse and validate a YAML policy document. An empty document yields
    /// the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, CortexError> {
        let policy = if content.trim().is_empty() {
            Policy::default()
        } else {
            serde_yaml_ng::from_str::<Policy>(content)
                .map_err(|e| CortexError::PolicyError(format!("invalid policy YAML: {}", e)))?
        };
        PolicyValidator::validate_policy(&policy)?;
        Ok(policy)
    }

    /// Load the policy document. A missing file is not fatal: defaults apply.
    pub fn load(path: &Path) -> Result<Self, CortexError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let policy = Self::from_yaml_str(&content)?;
                info!(path = %path.display(), "Loaded policy");
                Ok(policy)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Policy file not found, using defaults");
                Ok(Policy::default())
            }
            Err(e) => Err(CortexError::IoError(e)),
        }
    }
}

/// Accepts either the integer or the name of a level ("HIGH", "medium").
fn deserialize_level_lenient<'de, D>(deserializer: D) -> Result<TaintLevel, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LevelRepr {
        Num(u8),
        Name(String),
    }

    match LevelRepr::deserialize(deserializer)? {
        LevelRepr::Num(n) => TaintLevel::try_from(n).map_err(serde::de::Error::custom),
        LevelRepr::Name(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Policy evaluation decision result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Decision {
    /// Request is allowed
    Allowed,
    /// Request is denied with a reason
    Denied { reason: String },
}

impl Decision {
    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Denied { .. })
    }
}
