// SPDX-License-Identifier: BUSL-1.1
//! # ztm-api — Binary Entry Point
//!
//! Starts the Axum HTTP server plus the background loops that keep
//! trust assessments and policy caches live: the continuous
//! re-evaluation loop and the revocation propagation listener.

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;

use ztm_api::config::AppConfig;
use ztm_api::state::AppState;
use ztm_policy::spawn_revocation_listener;
use ztm_trust::spawn_reevaluation_loop;

#[derive(Debug, Parser)]
#[command(name = "ztm-api", version, about = "Trust evaluation and segmentation engine")]
struct Args {
    /// Path to the YAML configuration file. Omit to run with defaults
    /// (overridable via ZTM_* environment variables).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override the bind address from config (e.g. 127.0.0.1:9090).
    #[arg(long)]
    bind: Option<String>,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize structured tracing.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    let bind_addr: std::net::SocketAddr = config.bind_addr.parse()?;

    // Initialize database pool (optional — absent means in-memory only).
    let db_pool = db_init().await?;

    let state = AppState::from_config(config)?
        .with_db_pool(db_pool)
        .spawn_ingest_pool();

    // Background loops share a watch-based shutdown signal.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reeval = spawn_reevaluation_loop(
        state.scorer.clone(),
        state.monitor.subscribe_activity(),
        state.ca.subscribe_revocations(),
        shutdown_rx.clone(),
    );
    let revocations = spawn_revocation_listener(
        state.engine.clone(),
        state.ca.subscribe_revocations(),
        shutdown_rx,
    );

    let app = ztm_api::app(state);

    tracing::info!("ZTM API listening on {bind_addr}");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the background loops once the server has drained.
    let _ = shutdown_tx.send(true);
    let _ = reeval.await;
    let _ = revocations.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn db_init() -> anyhow::Result<Option<sqlx::PgPool>> {
    let pool = ztm_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;
    Ok(pool)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {e}");
    }
    tracing::info!("Shutdown signal received, draining connections");
}
