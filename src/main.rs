use anyhow::{Context, Result};
use backend_utils::{
    config::{load_dotenv, Config},
    server, telemetry,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    load_dotenv().context("Failed to load .env")?;
    let config = Config::from_env()?;

    telemetry::init(&config.telemetry);

    info!(
        application_name = %config.app.name,
        version = %config.app.version,
        auth_enabled = config.auth.is_some(),
        "Starting service"
    );

    server::run(config).await
}
