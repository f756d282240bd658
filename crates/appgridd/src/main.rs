//! appgridd — the AppGrid daemon.
//!
//! Single binary that assembles the control plane:
//! - State store (redb)
//! - Component synchronization engine
//! - Port exposure controller
//! - Worker task queue (drained in-process)
//! - REST API
//!
//! # Usage
//!
//! ```text
//! appgridd serve --port 7070 --data-dir /var/lib/appgrid --config appgrid.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use appgrid_core::PlatformConfig;
use appgrid_state::StateStore;
use appgrid_sync::{ChannelQueue, ExposureController, SyncEngine, Task};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Queue capacity before senders start waiting.
const QUEUE_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(name = "appgridd", about = "AppGrid component synchronization daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the REST API over a local state store.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "7070")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/appgrid")]
        data_dir: PathBuf,

        /// Platform config file (TOML). Defaults apply when absent.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve {
            port,
            data_dir,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            run_serve(port, data_dir, config).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,appgridd=debug,appgrid_sync=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PlatformConfig> {
    match path {
        Some(path) => {
            let config = PlatformConfig::from_file(path)?;
            info!(path = ?path, "platform config loaded");
            Ok(config)
        }
        None => Ok(PlatformConfig::default()),
    }
}

async fn run_serve(port: u16, data_dir: PathBuf, config: PlatformConfig) -> anyhow::Result<()> {
    info!("AppGrid daemon starting");

    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("appgrid.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let (queue, tasks) = ChannelQueue::new(QUEUE_CAPACITY);
    let engine = SyncEngine::new(store.clone(), &config);
    let exposure = ExposureController::new(store, &config, Arc::new(queue));
    info!(
        stream_ports = ?engine.allocator().range(),
        worker_topic = %config.queue.worker_topic,
        "engine initialized"
    );

    // ── Background tasks ───────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let drain_handle = tokio::spawn(drain_tasks(tasks, shutdown_rx));

    // ── Start API server ───────────────────────────────────────

    let router = appgrid_api::build_router(appgrid_api::ApiState { engine, exposure });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = drain_handle.await;

    info!("AppGrid daemon stopped");
    Ok(())
}

/// Consume worker tasks until shutdown. No worker runs in-process, so
/// tasks are logged for whoever tails the daemon.
async fn drain_tasks(mut tasks: mpsc::Receiver<Task>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            task = tasks.recv() => match task {
                Some(task) => info!(
                    topic = %task.topic,
                    task_type = %task.task_type,
                    body = %task.body,
                    "worker task"
                ),
                None => {
                    warn!("task queue closed");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
}
