use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use clinicserver::core::shared::utils::{create_conn, run_migrations};
use clinicserver::{run_server, seed_admin, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting clinicserver {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env()?;
    let pool = create_conn(&config.database)
        .map_err(|e| anyhow::anyhow!("Failed to open database {}: {e}", config.database.url))?;
    run_migrations(&pool).map_err(|e| anyhow::anyhow!("{e}"))?;

    if let Err(e) = seed_admin(&pool, &config) {
        error!("Failed to seed admin user: {e}");
    }

    let state = Arc::new(AppState::new(pool, config)?);
    run_server(state).await
}
