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

// Policy validation - fail-fast at config load time

use crate::engine_core::errors::CortexError;
use crate::engine_core::models::Policy;

use ipnetwork::IpNetwork;
use std::collections::HashSet;
use std::str::FromStr;

/// Validates the exec policy for structural correctness
pub struct PolicyValidator;

impl PolicyValidator {
    /// Validate a policy - call after loading from YAML
    pub fn validate_policy(policy: &Policy) -> Result<(), CortexError> {
        Self::validate_allowed_ips(&policy.allowed_ips)?;
        Self::validate_allowed_paths(&policy.allowed_paths)?;
        Ok(())
    }

    /// Every entry must be an IP literal or a CIDR block with a valid prefix.
    /// A bare address and its host-length block count as the same entry.
    fn validate_allowed_ips(allowed_ips: &[String]) -> Result<(), CortexError> {
        let mut seen = HashSet::new();
        for entry in allowed_ips {
            let network = IpNetwork::from_str(entry).map_err(|e| {
                CortexError::PolicyError(format!("allowed_ips: '{}' is not valid ({})", entry, e))
            })?;
            if !seen.insert(network) {
                return Err(CortexError::PolicyError(format!(
                    "allowed_ips: duplicate entry '{}'",
                    entry
                )));
            }
        }
        Ok(())
    }

    /// Globs must be non-empty absolute paths
    fn validate_allowed_paths(allowed_paths: &[String]) -> Result<(), CortexError> {
        for (idx, glob) in allowed_paths.iter().enumerate() {
            let context = format!("allowed_paths #{}", idx + 1);
            if glob.trim().is_empty() {
                return Err(CortexError::PolicyError(format!(
                    "{}: glob cannot be empty",
                    context
                )));
            }
            if !glob.starts_with('/') {
                return Err(CortexError::PolicyError(format!(
                    "{}: '{}' must be an absolute path",
                    context, glob
                )));
            }
            if glob.contains('\0') {
                return Err(CortexError::PolicyError(format!(
                    "{}: glob contains a NUL byte",
                    context
                )));
            }
        }
        Ok(())
    }
}
