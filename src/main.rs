mod api_doc;
mod app;
mod config;
mod contract;
mod error;
mod handlers;
mod models;
mod routes;
mod spanner;
mod state;
mod store;
mod telemetry;
mod validator;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use config::{Config, StoreBackend};
use contract::Contract;
use spanner::SpannerRecordStore;
use state::AppState;
use std::sync::Arc;
use store::{MemoryRecordStore, RecordStore};
use telemetry::UsageCounters;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("records-api starting");

    let config = Config::from_env()?;
    config.log_startup();

    let contract = Contract::load(config.contract_path.as_deref())?;

    let store: Arc<dyn RecordStore> = match (config.store_backend, &config.spanner) {
        (StoreBackend::Spanner, Some(spanner)) => {
            Arc::new(SpannerRecordStore::from_config(spanner).await?)
        }
        (StoreBackend::Spanner, None) => anyhow::bail!("Spanner backend selected without Spanner configuration"),
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory store; records are lost on restart");
            Arc::new(MemoryRecordStore::new())
        }
    };

    let counters = Arc::new(UsageCounters::new());
    let state = AppState {
        store,
        contract: Arc::new(contract),
        telemetry: counters.clone(),
    };
    let app = app::build_router(state);

    let addr = format!("{}:{}", config.service_host, config.service_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(
        "Server shutdown complete ({} records created: {:?})",
        counters.total_created(),
        counters.snapshot()
    );
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
