//! walletd Server Binary
//!
//! Wires configuration, logging, the in-memory stores, the transfer engine,
//! and the currency-rate collaborator into the HTTP router and serves it.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use walletd_auth::AuthGate;
use walletd_engine::{EngineConfig, TransferEngine};
use walletd_fx::{CurrencyApiProvider, FxService};
use walletd_server::{create_router, AppState, ServerConfig};
use walletd_store::{Database, ProductStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting walletd");

    // Load configuration
    let config = ServerConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let db = Arc::new(Database::new());
    let catalog = Arc::new(ProductStore::new());
    let engine = Arc::new(TransferEngine::new(
        db.clone(),
        catalog.clone(),
        EngineConfig::default(),
    ));
    let fx = Arc::new(FxService::new(Arc::new(CurrencyApiProvider::new(
        config.currency_api_url.clone(),
        config.currency_api_key.clone(),
    ))));

    let state = AppState {
        gate: AuthGate::new(db.accounts()),
        engine,
        accounts: db.accounts(),
        ledger: db.ledger(),
        catalog,
        fx,
    };

    let addr = config
        .socket_addr()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        listen_addr = %config.listen_addr,
        listen_port = config.listen_port,
        "walletd running"
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("walletd shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for Ctrl+C");
    info!("Shutdown signal received");
}
