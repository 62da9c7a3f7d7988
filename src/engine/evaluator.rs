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

//! Exec policy evaluation.
//!
//! This module implements the `PolicyEvaluator` which compares an agent's
//! live taint level against the configured `max_taint_for_exec` threshold.
//! The threshold is a strict upper bound: an agent sitting exactly on it may
//! still exec.

use tracing::warn;

use crate::engine_core::guardian::Guardian;
use crate::engine_core::models::{Decision, Policy, TaintLevel};

pub struct PolicyEvaluator;

impl PolicyEvaluator {
    /// Pure threshold check.
    pub fn exceeds_threshold(policy: &Policy, current: TaintLevel) -> bool {
        current > policy.max_taint_for_exec
    }

    /// Whether new-process creation must be blocked for `pid`.
    pub fn should_block_exec(guardian: &Guardian, pid: u32) -> bool {
        Self::evaluate_exec(guardian, pid).is_denied()
    }

    pub fn evaluate_exec(guardian: &Guardian, pid: u32) -> Decision {
        let policy = guardian.policy();
        let current = guardian.get_taint_level(pid);

        if Self::exceeds_threshold(policy, current) {
            warn!(
                pid,
                current = %current,
                threshold = %policy.max_taint_for_exec,
                "BLOCK: agent exceeds exec taint threshold"
            );
            return Decision::Denied {
                reason: format!(
                    "Agent {} taint {} exceeds exec threshold {}",
                    pid, current, policy.max_taint_for_exec
                ),
            };
        }

        Decision::Allowed
    }
}
