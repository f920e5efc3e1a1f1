//! # banca-server
//!
//! Server for Banca Messenger, a two-party direct-messaging service.
//!
//! This binary provides:
//! - **WebSocket endpoint** (`/ws`) carrying the real-time protocol:
//!   authentication, message fan-out, and `sent -> delivered -> read`
//!   status updates pushed back to the sender
//! - **REST API** (axum) for accounts, contacts, conversations, and message
//!   history, backed by SQLite
//! - **Per-IP rate limiting** on the REST API and per-channel limiting on
//!   WebSocket frames

mod api;
mod config;
mod credentials;
mod delivery;
mod error;
mod rate_limit;
mod registry;
mod seed;
mod session;
mod store;
mod ws;

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,banca_server=debug,banca_store=info")),
        )
        .init();

    info!("Starting Banca server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.expose_verification_codes {
        warn!("Verification codes are returned in HTTP responses; do not use in production");
    }

    // -----------------------------------------------------------------------
    // 3. Open the record store
    // -----------------------------------------------------------------------
    let store = Store::open(&config.database_path, config.in_memory_database())?;
    info!(
        path = %config.database_path.display(),
        in_memory = config.in_memory_database(),
        "Record store ready"
    );

    if config.seed_demo_users {
        store.call(seed::seed_demo_users).await?;
    }

    let http_addr = config.http_addr;
    let app_state = AppState::new(store, config);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = app_state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(600.0).await;
        }
    });

    // Periodic verification code cleanup (every 10 minutes)
    let codes = app_state.store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            match codes
                .call(|db| db.purge_expired_verification_codes(Utc::now()))
                .await
            {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged expired verification codes"),
                Err(e) => warn!(error = %e, "Verification code purge failed"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API and WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
