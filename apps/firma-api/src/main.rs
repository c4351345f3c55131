//! Firma API Server - digital signature request workflow
//!
//! Provides REST endpoints for:
//! - Creating and managing signature requests (internal)
//! - OTP delivery and verification for external signers (public)
//! - Stamped PDF delivery

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use firma_api::{config::AppConfig, router, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("firma_api=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!("Initializing Firma API...");
    let config = AppConfig::from_env();
    let port = config.port;

    let state = AppState::new(config).await?;
    let state = Arc::new(state);

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting Firma API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
