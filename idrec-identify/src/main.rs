//! idrec-identify - identity reconciliation microservice
//!
//! Serves `POST /identify` over a SQLite contact store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use idrec_common::config::{load_config, ConfigOverrides, ServiceConfig};
use idrec_identify::{build_router, db, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for idrec-identify
#[derive(Parser, Debug)]
#[command(name = "idrec-identify")]
#[command(about = "Identity reconciliation service")]
#[command(version)]
struct Args {
    /// TOML bootstrap config file (falls back to IDREC_CONFIG, then the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind
    #[arg(long, env = "IDREC_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "IDREC_PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(short, long, env = "IDREC_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let config = ServiceConfig::resolve(
        loaded.config,
        ConfigOverrides {
            database_path: args.database,
            host: args.host,
            port: args.port,
        },
    );

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "idrec_identify={lvl},idrec_common={lvl},tower_http={lvl}",
                lvl = config.log_level
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting idrec-identify v{}",
        env!("CARGO_PKG_VERSION")
    );
    match &loaded.source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No configuration file found, using defaults"),
    }

    info!("Database path: {}", config.database_path.display());
    let pool = db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let app = build_router(AppState::new(pool.clone()));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("idrec-identify listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
