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

//! Structured audit trail.
//!
//! Every control-plane decision (taint report, intent, exec check, agent
//! lifecycle change) is emitted as one `audit` target event whose payload is
//! a canonical JSON document, so log shippers can filter it out of the
//! operational stream.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    event_type: &'a str,
    details: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn log(&self, event_type: &str, details: serde_json::Value) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event_type,
            details,
        };

        let payload = serde_json::to_string(&entry).unwrap_or_default();

        info!(
            target: "audit",
            event_type,
            payload = %payload,
            "AUDIT"
        );
    }
}
