//! # consentry-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the Consentry platform.
//! Binds to a configurable port (default 8080).

use consentry_api::state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Build configuration from environment.
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let auth_token = std::env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty());
    if auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set — authentication disabled, all requests run as staff");
    }
    let config = AppConfig { port, auth_token };

    // Initialize database pool (optional — absent means in-memory only).
    let db_pool = consentry_api::db::init_pool().await.map_err(|e| {
        tracing::error!("database initialization failed: {e}");
        e
    })?;

    // Notifications: webhook delivery when configured, no-op otherwise.
    let notifier = consentry_api::notify::notifier_from_env();

    let state = AppState::with_config(config, notifier, db_pool);

    // Hydrate in-memory stores from the database (if connected).
    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("database hydration failed: {e}");
        e
    })?;

    let app = consentry_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Consentry API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
