use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, build_router, core_config_from_env};
use api_shared::HealthService;
use healthassist_core::Database;

/// Main entry point for the HealthAssist application
///
/// Loads `.env`, resolves the configuration once, checks every collection file and serves the
/// REST API with Swagger UI at `/swagger-ui`.
///
/// # Environment Variables
/// - `HEALTHASSIST_DATA_DIR`: Directory for the collection files (default: ".")
/// - `HEALTHASSIST_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `HEALTHASSIST_DAILY_NOTIFICATION_CAP`, `HEALTHASSIST_REMINDERS_PER_RUN`: reminder limits
/// - `API_KEY`: Optional API key for every route except `/health`
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup checks or the server fail
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("healthassist=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("HEALTHASSIST_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(core_config_from_env()?);
    tracing::info!("++ Using data directory {}", cfg.data_dir().display());

    let db = Database::open(cfg);
    db.initialise()?;

    let api_key = std::env::var("API_KEY").ok();
    if api_key.is_none() {
        tracing::warn!("API_KEY not set; REST routes are open");
    }

    tracing::info!("++ Starting HealthAssist REST on {}", rest_addr);
    tracing::info!("++ {}", HealthService::check_health().message);

    let app = build_router(AppState::new(db, api_key));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
