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

// Shared test doubles: a scripted Telos Core daemon and an in-memory channel
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

use telos_cortex::engine_core::models::TaintLevel;
use telos_cortex::ipc::{ChannelError, ChannelState, CoreCommand, EnforcementChannel};

/// What the fake daemon does with one request line.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok,
    OkWith(Value),
    Reject(String),
    /// Read the request, never answer
    Silent,
    /// Write half a response, then hang up
    CloseMidLine,
    /// Wait, then answer as the inner reply
    Delay(Duration, Box<Reply>),
}

type Script = Arc<dyn Fn(&Value) -> Reply + Send + Sync>;

/// Line-protocol daemon listening on a socket inside a temp directory.
pub struct FakeDaemon {
    _dir: TempDir,
    pub path: PathBuf,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeDaemon {
    pub fn ok() -> Self {
        Self::start(|_| Reply::Ok)
    }

    pub fn start<F>(script: F) -> Self
    where
        F: Fn(&Value) -> Reply + Send + Sync + 'static,
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let script: Script = Arc::new(script);

        let task = {
            let received = received.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let received = received.clone();
                    let script = script.clone();
                    tokio::spawn(async move {
                        let (read, mut write) = stream.into_split();
                        let mut lines = BufReader::new(read);
                        loop {
                            let mut line = String::new();
                            match lines.read_line(&mut line).await {
                                Ok(0) | Err(_) => return,
                                Ok(_) => {}
                            }
                            received.lock().unwrap().push(line.clone());
                            let request: Value =
                                serde_json::from_str(line.trim_end()).unwrap_or(Value::Null);

                            let mut reply = script(&request);
                            while let Reply::Delay(pause, inner) = reply {
                                tokio::time::sleep(pause).await;
                                reply = *inner;
                            }

                            let body = match reply {
                                Reply::Ok => json!({"success": true}),
                                Reply::OkWith(data) => json!({"success": true, "data": data}),
                                Reply::Reject(error) => json!({"success": false, "error": error}),
                                Reply::Silent => continue,
                                Reply::CloseMidLine => {
                                    let _ = write.write_all(b"{\"success\":tr").await;
                                    return;
                                }
                                Reply::Delay(..) => unreachable!("delays are unwrapped above"),
                            };
                            let mut out = serde_json::to_vec(&body).unwrap();
                            out.push(b'\n');
                            if write.write_all(&out).await.is_err() {
                                return;
                            }
                        }
                    });
                }
            })
        };

        Self {
            _dir: dir,
            path,
            received,
            connections,
            task,
        }
    }

    /// Raw request lines, newline included.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|v| v["command"].as_str().map(str::to_string))
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// In-memory channel that records commands instead of sending them.
#[derive(Default)]
pub struct MockChannel {
    pub sent: Mutex<Vec<CoreCommand>>,
    pub offline: bool,
}

impl MockChannel {
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<CoreCommand> {
        self.sent.lock().unwrap().clone()
    }

    fn push(&self, cmd: CoreCommand) -> Result<(), ChannelError> {
        if self.offline {
            return Err(ChannelError::Closed);
        }
        self.sent.lock().unwrap().push(cmd);
        Ok(())
    }
}

#[async_trait]
impl EnforcementChannel for MockChannel {
    async fn update_taint(&self, pid: u32, level: TaintLevel) -> Result<(), ChannelError> {
        self.push(CoreCommand::UpdateTaint {
            pid,
            taint_level: level,
        })
    }

    async fn clear_taint(&self, pid: u32) -> Result<(), ChannelError> {
        self.push(CoreCommand::ClearTaint { pid })
    }

    async fn register_agent(&self, pid: u32, comm: &str) -> Result<(), ChannelError> {
        self.push(CoreCommand::register_agent(pid, comm))
    }

    async fn get_state(&self) -> Result<Value, ChannelError> {
        self.push(CoreCommand::GetState {})?;
        Ok(json!({"tainted_pids": {}}))
    }

    async fn ping(&self) -> Result<(), ChannelError> {
        self.push(CoreCommand::Ping {})
    }

    async fn close(&self) {}

    fn state(&self) -> ChannelState {
        if self.offline {
            ChannelState::Disconnected
        } else {
            ChannelState::Connected
        }
    }
}
