//! # certichain-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the CertiChain API.
//! Binds to configurable port (default 8080).

use std::sync::Arc;

use certichain_api::db::memory::MemoryInstitutionStore;
use certichain_api::db::postgres::PgInstitutionStore;
use certichain_api::db::InstitutionStore;
use certichain_api::state::{AppConfig, AppState, Collaborators};
use metrics_exporter_prometheus::PrometheusBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        e
    })?;
    let port = config.port;

    // Initialize database pool (optional; absent means in-memory only).
    let db_pool = certichain_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;
    let institutions: Arc<dyn InstitutionStore> = match &db_pool {
        Some(pool) => Arc::new(PgInstitutionStore::new(pool.clone())),
        None => Arc::new(MemoryInstitutionStore::new()),
    };

    let collaborators = Collaborators::from_env().map_err(|e| {
        tracing::error!("Collaborator configuration failed: {e}");
        e
    })?;

    let metrics = PrometheusBuilder::new().install_recorder().map_err(|e| {
        tracing::error!("Failed to install metrics recorder: {e}");
        e
    })?;

    let state = AppState::with_store(config, collaborators, institutions, db_pool)
        .with_metrics(metrics);
    let _sweeper = state.signature_cache.spawn_sweeper();
    let app = certichain_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("CertiChain API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to JSON lines; the filter comes from `RUST_LOG`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
