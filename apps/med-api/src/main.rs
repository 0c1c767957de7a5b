//! Medication API
//!
//! HTTP service storing medication records per owner. Uniqueness and optimistic
//! concurrency are enforced by conditional writes in DynamoDB, so any number of
//! instances can run side by side without coordination.

mod config;
mod dto;
mod handlers;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use medication_domain::MedicationService;
use medication_store::{DynamoTable, MedicationStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// How long startup waits for the medication table to become reachable
const TABLE_PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state shared across handlers
pub struct AppState<S> {
    pub service: Arc<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("MED_LOG_LEVEL: invalid filter '{}'", config.log_level))?;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .init();

    info!(?config, "Starting medication API");

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let engine = DynamoTable::from_sdk_config(&aws_config, config.dynamo_endpoint.clone());

    engine
        .ping(&config.medication_table, TABLE_PING_TIMEOUT)
        .await
        .context("medication table is not reachable")?;

    let store = MedicationStore::new(engine, config.store_config());
    let service = MedicationService::with_repository(store);

    let app = routes::create_router(AppState {
        service: Arc::new(service),
    });

    serve(app, &config).await
}

async fn serve(app: axum::Router, config: &Config) -> Result<()> {
    info!(addr = %config.listen, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "Signal received, shutting down"),
        _ = terminate => info!(signal = "SIGTERM", "Signal received, shutting down"),
    }
}
