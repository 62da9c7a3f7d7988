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

mod common;

use common::{FakeDaemon, Reply};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use telos_cortex::engine_core::guardian::Guardian;
use telos_cortex::engine_core::models::{GuardianSnapshot, Policy, TaintLevel};
use telos_cortex::ipc::{CoreCommand, CoreIpcClient};

const WORKERS: u32 = 8;
const ROUNDS: u32 = 250;

fn assert_consistent(snapshot: &GuardianSnapshot) {
    match snapshot.active_agent {
        Some(pid) => assert!(
            snapshot.agents.contains_key(&pid),
            "active agent {} is not registered",
            pid
        ),
        None => assert!(
            snapshot.agents.is_empty(),
            "no active agent while {} are registered",
            snapshot.agents.len()
        ),
    }
    for (view, pid) in &snapshot.view_agent_map {
        let agent = snapshot
            .agents
            .get(pid)
            .unwrap_or_else(|| panic!("view {} points at unregistered agent {}", view, pid));
        assert!(
            agent.active_views.contains(view),
            "agent {} does not list view {}",
            pid,
            view
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_guardian_stays_consistent_under_parallel_writers() {
    let guardian = Arc::new(Guardian::new(Arc::new(Policy::default())));
    let running = Arc::new(AtomicBool::new(true));

    let checker = {
        let guardian = guardian.clone();
        let running = running.clone();
        tokio::spawn(async move {
            let mut checks = 0u32;
            while running.load(Ordering::SeqCst) {
                assert_consistent(&guardian.snapshot());
                checks += 1;
                tokio::task::yield_now().await;
            }
            checks
        })
    };

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let guardian = guardian.clone();
            tokio::spawn(async move {
                for round in 0..ROUNDS {
                    let pid = (worker * 7 + round) % 12 + 1;
                    let view = format!("tab{}", round % 5);
                    match round % 5 {
                        0 | 1 => {
                            guardian.register_agent(pid);
                        }
                        2 => {
                            guardian.update_taint(&view, TaintLevel::High, "https://x.test");
                        }
                        3 => {
                            let _ = guardian.map_view_to_agent(&view, pid);
                        }
                        _ => {
                            guardian.unregister_agent(pid);
                            guardian.clear_taint(pid);
                        }
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for worker in workers {
        worker.await.unwrap();
    }
    running.store(false, Ordering::SeqCst);
    let checks = checker.await.unwrap();
    assert!(checks > 0);

    assert_consistent(&guardian.snapshot());
    assert_eq!(guardian.agent_count(), guardian.snapshot().agents.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_commands_get_their_own_replies() {
    let daemon = FakeDaemon::start(|req| {
        let echo = Reply::OkWith(json!({"echo": req["data"]["pid"]}));
        // Uneven latency so replies would cross if exchanges interleaved
        if req["data"]["pid"].as_u64().unwrap_or(0) % 3 == 0 {
            Reply::Delay(Duration::from_millis(5), Box::new(echo))
        } else {
            echo
        }
    });
    let client = Arc::new(CoreIpcClient::with_timeouts(
        &daemon.path,
        Duration::from_millis(500),
        Duration::from_secs(2),
    ));

    let tasks: Vec<_> = (1..=32u32)
        .map(|pid| {
            let client = client.clone();
            tokio::spawn(async move {
                let response = client
                    .send_command(&CoreCommand::ClearTaint { pid })
                    .await
                    .unwrap();
                (pid, response)
            })
        })
        .collect();

    for task in tasks {
        let (pid, response) = task.await.unwrap();
        assert!(response.success);
        assert_eq!(response.data, Some(json!({"echo": pid})));
    }
    assert_eq!(daemon.connections(), 1);
    assert_eq!(daemon.commands().len(), 32);
}
