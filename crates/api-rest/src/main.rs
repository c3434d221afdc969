//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging when you want the REST server (with OpenAPI/Swagger
//! UI) without the workspace's `healthassist-run` entry point.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{build_router, core_config_from_env, AppState};
use healthassist_core::Database;

/// Main entry point for the HealthAssist REST API server
///
/// # Environment Variables
/// - `HEALTHASSIST_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `API_KEY`: When set, required in the `x-api-key` header of every request except `/health`
/// - plus the data settings read by [`core_config_from_env`]
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or a collection file is corrupt,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("HEALTHASSIST_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting HealthAssist REST API on {}", addr);

    let cfg = Arc::new(core_config_from_env()?);
    let db = Database::open(cfg);
    db.initialise()?;

    let app = build_router(AppState::new(db, std::env::var("API_KEY").ok()));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
