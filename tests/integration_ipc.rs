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

// Enforcement channel against a scripted daemon on a real Unix socket

mod common;

use common::{FakeDaemon, Reply};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use telos_cortex::engine_core::models::TaintLevel;
use telos_cortex::ipc::{ChannelError, ChannelState, CoreIpcClient, EnforcementChannel};

fn client_for(daemon: &FakeDaemon) -> CoreIpcClient {
    CoreIpcClient::with_timeouts(
        &daemon.path,
        Duration::from_millis(500),
        Duration::from_millis(200),
    )
}

/// Replies with `first` to the first request, then `Reply::Ok`.
fn first_then_ok(first: Reply) -> impl Fn(&serde_json::Value) -> Reply + Send + Sync {
    let calls = AtomicUsize::new(0);
    move |_| {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            first.clone()
        } else {
            Reply::Ok
        }
    }
}

#[tokio::test]
async fn test_update_taint_exact_wire_bytes() {
    let daemon = FakeDaemon::ok();
    let client = client_for(&daemon);

    client.update_taint(100, TaintLevel::High).await.unwrap();

    assert_eq!(
        daemon.received(),
        vec!["{\"command\":\"UPDATE_TAINT\",\"data\":{\"pid\":100,\"taint_level\":3}}\n".to_string()]
    );
    assert_eq!(client.state(), ChannelState::Connected);
}

#[tokio::test]
async fn test_commands_share_one_connection() {
    let daemon = FakeDaemon::ok();
    let client = client_for(&daemon);

    client.register_agent(100, "python3-with-a-long-name").await.unwrap();
    client.clear_taint(100).await.unwrap();
    client.ping().await.unwrap();

    assert_eq!(daemon.connections(), 1);
    assert_eq!(
        daemon.commands(),
        vec!["REGISTER_AGENT", "CLEAR_TAINT", "PING"]
    );
    let register: serde_json::Value = serde_json::from_str(&daemon.received()[0]).unwrap();
    assert_eq!(register["data"]["comm"], "python3-with-a-");
}

#[tokio::test]
async fn test_get_state_returns_daemon_data() {
    let daemon = FakeDaemon::start(|req| {
        if req["command"] == "GET_STATE" {
            Reply::OkWith(json!({"tainted_pids": {"100": 3}}))
        } else {
            Reply::Ok
        }
    });
    let client = client_for(&daemon);

    let state = client.get_state().await.unwrap();
    assert_eq!(state["tainted_pids"]["100"], 3);
    assert_eq!(daemon.received()[0], "{\"command\":\"GET_STATE\",\"data\":{}}\n");
}

#[tokio::test]
async fn test_missing_socket_is_connect_failure() {
    let dir = tempfile::tempdir().unwrap();
    let client = CoreIpcClient::new(dir.path().join("absent.sock"));

    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, ChannelError::ConnectFailed { .. }));
    assert_eq!(client.state(), ChannelState::Disconnected);
}

#[tokio::test]
async fn test_rejection_keeps_connection() {
    let daemon = FakeDaemon::start(first_then_ok(Reply::Reject("unknown pid".to_string())));
    let client = client_for(&daemon);

    let err = client.clear_taint(7).await.unwrap_err();
    assert!(matches!(&err, ChannelError::Rejected(msg) if msg == "unknown pid"));
    assert!(!err.is_transport());
    assert_eq!(client.state(), ChannelState::Connected);

    client.clear_taint(7).await.unwrap();
    assert_eq!(daemon.connections(), 1);
}

#[tokio::test]
async fn test_eof_before_newline_drops_and_reconnects() {
    let daemon = FakeDaemon::start(first_then_ok(Reply::CloseMidLine));
    let client = client_for(&daemon);

    let err = client.update_taint(100, TaintLevel::Critical).await.unwrap_err();
    assert!(matches!(err, ChannelError::Closed));
    assert_eq!(client.state(), ChannelState::Disconnected);

    client.update_taint(100, TaintLevel::Critical).await.unwrap();
    assert_eq!(daemon.connections(), 2);
    assert_eq!(client.state(), ChannelState::Connected);
}

#[tokio::test]
async fn test_read_timeout_drops_and_reconnects() {
    let daemon = FakeDaemon::start(first_then_ok(Reply::Silent));
    let client = client_for(&daemon);

    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, ChannelError::ReadTimeout(_)));
    assert_eq!(client.state(), ChannelState::Disconnected);

    client.ping().await.unwrap();
    assert_eq!(daemon.connections(), 2);
}

#[tokio::test]
async fn test_close_then_reuse() {
    let daemon = FakeDaemon::ok();
    let client = client_for(&daemon);
    let mut states = client.subscribe_state();

    client.connect().await.unwrap();
    assert_eq!(*states.borrow_and_update(), ChannelState::Connected);

    client.close().await;
    assert_eq!(client.state(), ChannelState::Disconnected);

    client.ping().await.unwrap();
    assert_eq!(daemon.connections(), 2);
}

#[tokio::test]
async fn test_abandoned_command_does_not_shift_replies() {
    let calls = AtomicUsize::new(0);
    let daemon = FakeDaemon::start(move |req| {
        let echo = Reply::OkWith(json!({"reply_to": req["command"]}));
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Reply::Delay(Duration::from_millis(150), Box::new(echo))
        } else {
            echo
        }
    });
    let client = client_for(&daemon);

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), client.update_taint(100, TaintLevel::High))
            .await;
    assert!(abandoned.is_err());

    let state = client.get_state().await.unwrap();
    assert_eq!(state, json!({"reply_to": "GET_STATE"}));
    assert_eq!(daemon.commands(), vec!["UPDATE_TAINT", "GET_STATE"]);
    assert_eq!(daemon.connections(), 1);
    assert_eq!(client.state(), ChannelState::Connected);
}
