//! spm-ingest - Shop performance upload reconciliation service
//!
//! Accepts services/operations spreadsheets, proposes market, store and
//! advisor matches for human review, and commits confirmed uploads.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use spm_common::config::TomlConfig;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spm_ingest::AppState;

const SERVICE_NAME: &str = "spm-ingest";

/// Command-line arguments for spm-ingest
#[derive(Parser, Debug)]
#[command(name = "spm-ingest")]
#[command(about = "Shop performance upload reconciliation service")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/spm/spm-ingest.toml)
    #[arg(short, long, env = "SPM_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(short, long, env = "SPM_DATABASE")]
    database: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "SPM_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(SERVICE_NAME, args.config.as_deref())
        .with_overrides(args.database, args.port)
        .context("Invalid configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    let default_filter = format!(
        "spm_ingest={level},spm_common={level},tower_http={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting {} v{}", SERVICE_NAME, env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database_path.display());

    let db_pool = spm_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let app = spm_ingest::build_router(AppState::new(db_pool));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
