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

//! OS process inspection.
//!
//! Liveness probing for the stale-agent reaper and `comm` lookup for
//! REGISTER_AGENT payloads.

use crate::engine_core::guardian::LivenessProbe;

/// Probes liveness with `kill(pid, 0)`.
///
/// `ESRCH` means the process is gone. Any other outcome, including `EPERM`
/// for processes owned by another user, counts as alive. PIDs that cannot
/// name a single process (0, or beyond `i32::MAX`) are never checked and
/// count as alive, so the reaper leaves them registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessProbe;

impl LivenessProbe for ProcessProbe {
    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        match i32::try_from(pid) {
            Ok(raw) if raw > 0 => !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH)),
            // kill(2) would address a process group or fail with EINVAL
            _ => true,
        }
    }

    #[cfg(not(unix))]
    fn is_alive(&self, _pid: u32) -> bool {
        true
    }
}

/// Read the kernel command name of a process, if visible.
pub fn read_comm(pid: u32) -> Option<String> {
    std::fs::read_to_string(format!("/proc/{}/comm", pid))
        .ok()
        .map(|s| s.trim_end_matches('\n').to_string())
        .filter(|s| !s.is_empty())
}
