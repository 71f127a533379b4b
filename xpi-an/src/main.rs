//! Analysis service (xpi-an) - main entry point
//!
//! Listens for analysis triggers from xpi-ui, runs the analysis job on a
//! background task and periodically sweeps completed, unprocessed sessions.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use xpi_an::llm::{ChatModel, OpenAiChatModel, UnconfiguredModel};
use xpi_an::{build_router, sweep, AppState};
use xpi_common::config::{self, resolve};

/// Command-line arguments for xpi-an
#[derive(Parser, Debug)]
#[command(name = "xpi-an")]
#[command(about = "Analysis service for XPI expert interviews")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "XPI_AN_PORT")]
    port: Option<u16>,

    /// Path of the shared SQLite database
    #[arg(long, env = "XPI_DATABASE_PATH")]
    database_path: Option<PathBuf>,

    /// TOML config file
    #[arg(long, env = config::CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// OpenAI API key; without one every model call falls back
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Chat model name
    #[arg(long, env = "XPI_MODEL")]
    model: Option<String>,

    /// Chat-completions API base URL
    #[arg(long, env = "XPI_OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    /// Timeout for each model request, in seconds
    #[arg(long, env = "XPI_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Seconds between reconciliation sweeps (0 disables the sweep)
    #[arg(long, env = "XPI_SWEEP_INTERVAL_SECS")]
    sweep_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging starts at the default level so config loading is visible;
    // the configured level is applied once the file has been read.
    let rust_log = std::env::var("RUST_LOG").ok();
    let (filter, filter_handle) = reload::Layer::new(EnvFilter::new(config::log_directive(
        rust_log.as_deref(),
        "info",
    )));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = args.config.clone().or_else(config::config_file_path);
    let toml_config = config::load_toml_config(config_path.as_deref())
        .context("Failed to load configuration")?;

    let directive = config::log_directive(rust_log.as_deref(), &toml_config.logging.level);
    if let Err(e) = filter_handle.reload(EnvFilter::new(&directive)) {
        warn!(error = %e, "Failed to apply configured log level");
    }

    let analysis = &toml_config.analysis;
    let port = resolve(args.port, analysis.port, config::DEFAULT_AN_PORT);
    let db_path = config::resolve_database_path(args.database_path.clone(), &toml_config);
    let model_name = resolve(args.model.clone(), analysis.model.clone(), config::DEFAULT_MODEL.to_string());
    let base_url = config::normalize_base_url(
        "openai_base_url",
        &resolve(
            args.openai_base_url.clone(),
            analysis.openai_base_url.clone(),
            config::DEFAULT_OPENAI_BASE_URL.to_string(),
        ),
    )?;
    let request_timeout = Duration::from_secs(resolve(
        args.request_timeout_secs,
        analysis.request_timeout_secs,
        config::DEFAULT_REQUEST_TIMEOUT_SECS,
    ));
    let sweep_interval_secs = resolve(
        args.sweep_interval_secs,
        analysis.sweep_interval_secs,
        config::DEFAULT_SWEEP_INTERVAL_SECS,
    );

    info!("Starting XPI analysis service on port {}", port);
    info!("Database: {}", db_path.display());

    let db = xpi_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let api_key = args
        .openai_api_key
        .clone()
        .or_else(|| analysis.openai_api_key.clone())
        .filter(|key| !key.trim().is_empty());

    let model: Arc<dyn ChatModel> = match api_key {
        Some(key) => {
            info!(model = %model_name, base_url = %base_url, "Chat model configured");
            Arc::new(
                OpenAiChatModel::new(key, base_url, model_name, request_timeout)
                    .context("Failed to build chat model client")?,
            )
        }
        None => {
            warn!("OPENAI_API_KEY not set; analysis will use fallback results only");
            Arc::new(UnconfiguredModel)
        }
    };

    let state = AppState::new(db.clone(), model);
    let cancel = CancellationToken::new();

    let sweep_handle = if sweep_interval_secs > 0 {
        Some(tokio::spawn(sweep::run_sweep(
            state.clone(),
            Duration::from_secs(sweep_interval_secs),
            cancel.clone(),
        )))
    } else {
        info!("Reconciliation sweep disabled");
        None
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    if let Some(handle) = sweep_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "Sweep task ended abnormally");
        }
    }

    db.close().await;
    info!("Shutdown complete");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
