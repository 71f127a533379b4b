//! Application service (xpi-ui) - main entry point
//!
//! Serves the project, CSV, link and interview API. Completing an interview
//! session posts an analysis trigger to xpi-an.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use xpi_common::config::{self, resolve};
use xpi_ui::services::AnalysisTrigger;
use xpi_ui::{build_router, AppState};

/// Command-line arguments for xpi-ui
#[derive(Parser, Debug)]
#[command(name = "xpi-ui")]
#[command(about = "Application API for XPI expert interviews")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "XPI_UI_PORT")]
    port: Option<u16>,

    /// Path of the shared SQLite database
    #[arg(long, env = "XPI_DATABASE_PATH")]
    database_path: Option<PathBuf>,

    /// TOML config file
    #[arg(long, env = config::CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Public base URL used in interview link URLs
    #[arg(long, env = "XPI_APP_URL")]
    app_url: Option<String>,

    /// Base URL of the analysis service
    #[arg(long, env = "XPI_ANALYSIS_URL")]
    analysis_url: Option<String>,
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

    let ui = &toml_config.ui;
    let port = resolve(args.port, ui.port, config::DEFAULT_UI_PORT);
    let db_path = config::resolve_database_path(args.database_path.clone(), &toml_config);
    let app_url = config::normalize_base_url(
        "app_url",
        &resolve(args.app_url.clone(), ui.app_url.clone(), config::DEFAULT_APP_URL.to_string()),
    )?;
    let analysis_url = config::normalize_base_url(
        "analysis_url",
        &resolve(
            args.analysis_url.clone(),
            ui.analysis_url.clone(),
            config::DEFAULT_ANALYSIS_URL.to_string(),
        ),
    )?;

    info!("Starting XPI application service on port {}", port);
    info!("Database: {}", db_path.display());
    info!(app_url = %app_url, analysis_url = %analysis_url, "Service URLs");

    let db = xpi_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let state = AppState::new(db.clone(), app_url, AnalysisTrigger::new(analysis_url));
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
