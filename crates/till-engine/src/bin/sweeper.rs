//! # till-sweeper
//!
//! Standalone reservation expiry sweeper.
//!
//! ```text
//! till-sweeper [CONFIG_PATH]
//!
//!   CONFIG_PATH   engine.toml (default: platform config dir)
//!   RUST_LOG      log filter (default: info,till=debug,sqlx=warn)
//! ```

use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use till_db::Database;
use till_engine::{EngineConfig, ReservationSweeper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = EngineConfig::load(config_path)?;

    info!(path = ?config.database.path, "Starting reservation sweeper...");

    let db = Database::new(config.db_config()).await?;
    let (sweeper, handle) = ReservationSweeper::new(db.clone(), config.sweeper.interval());
    let task = tokio::spawn(sweeper.run());

    shutdown_signal().await;
    handle.shutdown().await;

    if let Err(e) = task.await {
        error!(?e, "Sweeper task ended abnormally");
    }

    db.close().await;
    info!("Sweeper shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,till=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(?e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping sweeper...");
}
