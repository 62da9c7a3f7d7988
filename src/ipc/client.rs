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

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use super::codec::CoreCodec;
use super::protocol::{CoreCommand, CoreResponse};
use super::{ChannelError, ChannelState, EnforcementChannel};
use crate::engine_core::constants::defaults;
use crate::engine_core::models::TaintLevel;

type CoreFramed = Framed<UnixStream, CoreCodec>;

enum Link {
    Disconnected,
    Connecting,
    Connected(CoreFramed),
}

impl Link {
    fn state(&self) -> ChannelState {
        match self {
            Link::Disconnected => ChannelState::Disconnected,
            Link::Connecting => ChannelState::Connecting,
            Link::Connected(_) => ChannelState::Connected,
        }
    }
}

struct Shared {
    socket_path: PathBuf,
    connect_timeout: Duration,
    read_timeout: Duration,
    link: Mutex<Link>,
    state_tx: watch::Sender<ChannelState>,
}

/// Unix-socket client for the Telos Core daemon.
///
/// One command is in flight at a time. A command issued while disconnected
/// makes exactly one connection attempt; any transport failure drops the
/// socket so the next command reconnects.
///
/// Each request/response exchange runs on its own task. A caller that stops
/// waiting does not abandon the exchange half way, so the next command never
/// reads a reply meant for an earlier one.
pub struct CoreIpcClient {
    shared: Arc<Shared>,
}

impl CoreIpcClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self::with_timeouts(
            socket_path,
            Duration::from_millis(defaults::CONNECT_TIMEOUT_MS),
            Duration::from_millis(defaults::READ_TIMEOUT_MS),
        )
    }

    pub fn with_timeouts(
        socket_path: impl Into<PathBuf>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                socket_path: socket_path.into(),
                connect_timeout,
                read_timeout,
                link: Mutex::new(Link::Disconnected),
                state_tx,
            }),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.shared.socket_path
    }

    /// Observe state transitions without taking the connection lock.
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state_tx.subscribe()
    }

    /// Establish the connection if not already connected.
    pub async fn connect(&self) -> Result<(), ChannelError> {
        let mut link = self.shared.link.lock().await;
        if matches!(*link, Link::Connected(_)) {
            return Ok(());
        }
        self.shared.connect_locked(&mut link).await
    }

    /// Write one command and read its response line.
    ///
    /// Transport errors close the connection. A `success: false` response
    /// is returned as-is.
    pub async fn send_command(&self, cmd: &CoreCommand) -> Result<CoreResponse, ChannelError> {
        let shared = self.shared.clone();
        let owned = cmd.clone();
        tokio::spawn(async move { shared.round_trip(&owned).await })
            .await
            .map_err(|e| ChannelError::Io(std::io::Error::other(e.to_string())))?
    }

    async fn execute(&self, cmd: CoreCommand) -> Result<Option<Value>, ChannelError> {
        let response = self.send_command(&cmd).await?;
        if response.success {
            debug!(command = cmd.name(), "Telos Core acknowledged");
            Ok(response.data)
        } else {
            let reason = response.error.unwrap_or_else(|| "Unknown error".to_string());
            error!(command = cmd.name(), error = %reason, "Telos Core rejected command");
            Err(ChannelError::Rejected(reason))
        }
    }
}

impl Shared {
    fn set_link(&self, slot: &mut Link, next: Link) {
        let state = next.state();
        *slot = next;
        self.state_tx.send_replace(state);
    }

    async fn connect_locked(&self, link: &mut Link) -> Result<(), ChannelError> {
        self.set_link(link, Link::Connecting);
        let path = self.socket_path.display().to_string();

        match timeout(self.connect_timeout, UnixStream::connect(&self.socket_path)).await {
            Ok(Ok(stream)) => {
                self.set_link(link, Link::Connected(Framed::new(stream, CoreCodec::new())));
                info!(socket = %path, "Connected to Telos Core");
                Ok(())
            }
            Ok(Err(source)) => {
                self.set_link(link, Link::Disconnected);
                match source.kind() {
                    ErrorKind::NotFound => {
                        warn!(socket = %path, "Telos Core socket not found, daemon not running?")
                    }
                    ErrorKind::ConnectionRefused => {
                        warn!(socket = %path, "Telos Core refused connection")
                    }
                    ErrorKind::PermissionDenied => {
                        warn!(socket = %path, "Permission denied on Telos Core socket")
                    }
                    _ => warn!(socket = %path, error = %source, "Telos Core connect failed"),
                }
                Err(ChannelError::ConnectFailed { path, source })
            }
            Err(_) => {
                self.set_link(link, Link::Disconnected);
                warn!(socket = %path, timeout = ?self.connect_timeout, "Telos Core connect timed out");
                Err(ChannelError::ConnectTimeout(self.connect_timeout))
            }
        }
    }

    async fn exchange(
        framed: &mut CoreFramed,
        cmd: &CoreCommand,
        io_timeout: Duration,
    ) -> Result<CoreResponse, ChannelError> {
        timeout(io_timeout, framed.send(cmd))
            .await
            .map_err(|_| ChannelError::WriteTimeout(io_timeout))??;

        match timeout(io_timeout, framed.next()).await {
            Err(_) => Err(ChannelError::ReadTimeout(io_timeout)),
            Ok(None) => Err(ChannelError::Closed),
            Ok(Some(frame)) => frame,
        }
    }

    async fn round_trip(&self, cmd: &CoreCommand) -> Result<CoreResponse, ChannelError> {
        let mut link = self.link.lock().await;
        if !matches!(*link, Link::Connected(_)) {
            self.connect_locked(&mut link).await?;
        }
        let Link::Connected(framed) = &mut *link else {
            return Err(ChannelError::Closed);
        };

        let result = Self::exchange(framed, cmd, self.read_timeout).await;
        if let Err(e) = &result {
            error!(command = cmd.name(), error = %e, "Telos Core IPC failed, dropping connection");
            self.set_link(&mut link, Link::Disconnected);
        }
        result
    }
}

#[async_trait]
impl EnforcementChannel for CoreIpcClient {
    async fn update_taint(&self, pid: u32, level: TaintLevel) -> Result<(), ChannelError> {
        self.execute(CoreCommand::UpdateTaint {
            pid,
            taint_level: level,
        })
        .await?;
        info!(pid, level = %level, "Core: taint updated");
        Ok(())
    }

    async fn clear_taint(&self, pid: u32) -> Result<(), ChannelError> {
        self.execute(CoreCommand::ClearTaint { pid }).await?;
        info!(pid, "Core: taint cleared");
        Ok(())
    }

    async fn register_agent(&self, pid: u32, comm: &str) -> Result<(), ChannelError> {
        let cmd = CoreCommand::register_agent(pid, comm);
        self.execute(cmd).await?;
        info!(pid, comm, "Core: agent registered");
        Ok(())
    }

    async fn get_state(&self) -> Result<Value, ChannelError> {
        Ok(self
            .execute(CoreCommand::GetState {})
            .await?
            .unwrap_or_else(|| Value::Object(Default::default())))
    }

    async fn ping(&self) -> Result<(), ChannelError> {
        self.execute(CoreCommand::Ping {}).await.map(|_| ())
    }

    async fn close(&self) {
        let mut link = self.shared.link.lock().await;
        if matches!(*link, Link::Connected(_)) {
            info!("Closing Telos Core connection");
        }
        self.shared.set_link(&mut link, Link::Disconnected);
    }

    fn state(&self) -> ChannelState {
        *self.shared.state_tx.borrow()
    }
}
