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

// Entry point for the Telos control plane
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use telos_cortex::api::{create_router, AppState};
use telos_cortex::config::{Config, ConfigOverrides, LogFormat};
use telos_cortex::engine_core::guardian::Guardian;
use telos_cortex::engine_core::models::Policy;
use telos_cortex::ipc::{CoreIpcClient, EnforcementChannel};
use telos_cortex::service::ControlService;
use telos_cortex::utils::process::ProcessProbe;

#[derive(Parser, Debug)]
#[command(version, about = "Telos Cortex: taint control plane", long_about = None)]
struct Cli {
    /// RPC listen port
    #[arg(long)]
    port: Option<u16>,

    /// RPC bind address
    #[arg(long)]
    bind: Option<String>,

    /// Telos Core Unix socket
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Path to policy YAML file
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Force debug logging
    #[arg(long)]
    debug: bool,

    /// Log output format (text or json)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Seconds between stale-agent sweeps (0 disables)
    #[arg(long)]
    reap_interval_secs: Option<u64>,
}

impl From<Cli> for ConfigOverrides {
    fn from(cli: Cli) -> Self {
        Self {
            bind_address: cli.bind,
            port: cli.port,
            socket_path: cli.socket,
            policy_path: cli.policy,
            log_format: cli.log_format,
            reap_interval_secs: cli.reap_interval_secs,
            debug: cli.debug,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    install_panic_hook();

    let config = Config::from_env()
        .context("failed to load configuration")?
        .apply_overrides(cli.into());
    init_tracing(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen_address(),
        socket = %config.socket_path.display(),
        "Starting Telos Cortex"
    );

    let policy = Policy::load(&config.policy_path).with_context(|| {
        format!("failed to load policy from {}", config.policy_path.display())
    })?;
    let guardian = Arc::new(Guardian::new(Arc::new(policy)));

    let client = Arc::new(CoreIpcClient::with_timeouts(
        &config.socket_path,
        config.connect_timeout(),
        config.read_timeout(),
    ));
    match client.connect().await {
        Ok(()) => info!("Enforcement channel ready"),
        Err(e) => warn!(error = %e, "Telos Core unavailable, running in standalone mode"),
    }
    let channel: Arc<dyn EnforcementChannel> = client;

    if let Some(interval) = config.reap_interval() {
        spawn_reaper(guardian.clone(), channel.clone(), interval);
    }

    let config = Arc::new(config);
    let service = ControlService::new(guardian, channel.clone());
    let app = create_router(AppState::new(service, config.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen_address())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_address()))?;
    info!(address = %config.listen_address(), "Control service listening");

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = stop_rx.changed().await;
    });
    let mut server_task = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server_task => {
            joined.context("server task failed")?.context("server error")?;
        }
        _ = shutdown_signal() => {
            let _ = stop_tx.send(true);
            match tokio::time::timeout(config.shutdown_grace(), &mut server_task).await {
                Ok(joined) => {
                    if let Err(e) = joined.context("server task failed")? {
                        error!(error = %e, "Server error during shutdown");
                    }
                }
                Err(_) => {
                    warn!(grace = ?config.shutdown_grace(), "Grace period elapsed, dropping open requests");
                    server_task.abort();
                }
            }
        }
    }

    channel.close().await;
    info!("Telos Cortex stopped");
    Ok(())
}

/// Periodically unregister agents whose processes have exited and release
/// their daemon-side state.
fn spawn_reaper(guardian: Arc<Guardian>, channel: Arc<dyn EnforcementChannel>, interval: Duration) {
    info!(interval = ?interval, "Stale-agent reaper enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            for pid in guardian.reap_dead_agents(&ProcessProbe) {
                if let Err(e) = channel.clear_taint(pid).await {
                    debug!(pid, error = %e, "Could not release reaped agent on daemon");
                }
            }
        }
    });
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("PANIC: {} at {}", message, location);
    }));
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = if config.log_level == "debug" {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, starting graceful shutdown"),
        _ = terminate => info!("SIGTERM received, starting graceful shutdown"),
    }
}
