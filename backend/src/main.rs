//! Vitals backend server.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vitals::{
    config::Config,
    create_app_with_config,
    state::AppState,
    storage::{MemoryStorage, PostgresStorage, Storage},
};

/// Vitals - personal health data backend with REST and MCP APIs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "VITALS_PORT")]
    port: Option<u16>,

    /// PostgreSQL connection URL (data is kept in memory when unset)
    #[arg(long, env = "VITALS_DATABASE_URL")]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration: CLI args > env vars > config files > defaults
    let config = Config::from_figment(args.port, args.database_url, args.log_level)?;

    // Keep the guard alive for the lifetime of the process so file logs are flushed
    let _log_guard = init_logging(&config)?;

    info!("Starting Vitals backend server...");
    info!("Configuration loaded");

    let storage = open_storage(&config).await?;

    let state = AppState::new(storage).with_max_body_bytes(config.max_body_bytes);

    if let Some(max_idle) = config.session_idle_timeout {
        info!(
            "Evicting MCP sessions idle for {}s (sweep every {}s)",
            max_idle.as_secs(),
            config.sweep_interval.as_secs()
        );
        state
            .sessions()
            .spawn_idle_sweeper(max_idle, config.sweep_interval);
    }

    let app = create_app_with_config(state.clone(), config.cors_allowed_origins.clone());

    // Bind to 0.0.0.0 to be accessible from all interfaces (Docker, network, etc.)
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Set up graceful shutdown handler
    let shutdown_state = state.clone();
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        info!("Received Ctrl+C, shutting down gracefully...");

        // Closing sessions ends their push streams so open SSE responses complete
        shutdown_state.sessions().close_all().await;

        info!("Server shutting down");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

/// Initialize logging to stdout, plus a log file when one is configured.
///
/// An explicit log level overrides `RUST_LOG`; without either, `info` is used.
fn init_logging(config: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = match config.log_level.as_deref() {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(directory)?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();

    if let Some(path) = &config.log_file {
        info!("Writing logs to {}", path.display());
    }

    Ok(guard)
}

/// Open PostgreSQL storage when a database URL is configured, otherwise
/// fall back to in-memory storage.
async fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    match &config.database_url {
        Some(url) => {
            let storage = PostgresStorage::new(url, config.max_connections).await?;
            storage.run_migrations().await?;
            info!("Connected to PostgreSQL storage");
            Ok(Arc::new(storage))
        }
        None => {
            warn!("No database URL configured, data is kept in memory and lost on restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}
