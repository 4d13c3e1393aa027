use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oak_runtime::{DaemonConfig, DaemonState, Scheduler, resolve_data_dir};
use oak_server::{ApiState, build_router};

#[derive(Parser)]
#[command(name = "oakd", version, about = "Project memory daemon for AI coding agents")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon in the foreground
    Serve {
        /// Project root to serve (defaults to the working directory)
        #[arg(long)]
        project_root: Option<PathBuf>,

        /// Data directory override (defaults to <project>/.oak)
        #[arg(long)]
        data_dir: Option<String>,

        /// Config file (defaults to <data_dir>/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Serve {
            project_root,
            data_dir,
            config,
        } => serve(project_root, data_dir, config).await,
    }
}

async fn serve(
    project_root: Option<PathBuf>,
    data_dir: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let project_root = match project_root {
        Some(path) => path,
        None => std::env::current_dir().context("resolving working directory")?,
    };
    let data_dir = resolve_data_dir(data_dir.as_deref(), &project_root);

    let config_path = config_path.unwrap_or_else(|| data_dir.join("config.toml"));
    let config = DaemonConfig::load_from(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let _log_guard = oak_runtime::init_logging(&data_dir, &config.log)
        .context("initializing logging")?;

    let state = DaemonState::initialize(&project_root, &data_dir, config)
        .context("initializing daemon state")?;
    tracing::info!(
        project_root = %state.project_root.display(),
        data_dir = %state.data_dir.display(),
        port = state.port,
        "oakd starting"
    );

    // Background machinery: processor workers and the recovery loop all
    // observe the scheduler's shutdown signal.
    let mut scheduler = Scheduler::new();
    for worker in 0..state.config.processing.workers.max(1) {
        let engine = state.engine.clone();
        let shutdown = scheduler.shutdown_signal();
        scheduler.spawn(&format!("processor-{}", worker), async move {
            oak_engine::run_processor_worker(engine, shutdown).await;
        });
    }
    {
        let engine = state.engine.clone();
        let recovery = state.config.recovery.clone();
        let shutdown = scheduler.shutdown_signal();
        scheduler.spawn("recovery", async move {
            oak_runtime::run_recovery_loop(engine, recovery, shutdown).await;
        });
    }

    let bind: SocketAddr = format!("{}:{}", state.config.server.bind, state.port)
        .parse()
        .context("parsing bind address")?;
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {}", bind))?;

    oak_runtime::write_port_file(&state.data_dir, state.port)?;
    oak_runtime::write_pid_file(&state.data_dir)?;
    tracing::info!(%bind, token = %state.auth_token, "listening");

    let router = build_router(ApiState {
        daemon: state.clone(),
    });

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Cooperative shutdown: stop background workers, then make sure every
    // buffered activity is flushed before the process returns.
    tracing::info!("shutting down");
    scheduler.shutdown().await;
    tokio::time::timeout(Duration::from_secs(5), state.engine.flush_all_buffers())
        .await
        .ok();
    oak_runtime::remove_runtime_files(&state.data_dir);
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
}
