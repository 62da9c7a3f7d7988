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

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_flags() {
    Command::cargo_bin("telos-cortex")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--socket"))
        .stdout(predicate::str::contains("--policy"))
        .stdout(predicate::str::contains("--reap-interval-secs"));
}

#[test]
fn test_invalid_policy_aborts_startup() {
    let dir = tempfile::tempdir().unwrap();
    let policy = dir.path().join("policy.yaml");
    std::fs::write(&policy, "max_taint_for_exec: 9\n").unwrap();

    Command::cargo_bin("telos-cortex")
        .unwrap()
        .args(["--port", "0", "--socket"])
        .arg(dir.path().join("core.sock"))
        .arg("--policy")
        .arg(&policy)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load policy"));
}

#[test]
fn test_invalid_env_value_aborts_startup() {
    Command::cargo_bin("telos-cortex")
        .unwrap()
        .env("TELOS_READ_TIMEOUT_MS", "soon")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TELOS_READ_TIMEOUT_MS"));
}
