use spending_core::config::Settings;
use spending_core::observability::{init_logging, mask_sensitive, LogConfig};
use spending_core::repositories;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    init_logging(&LogConfig::from(&settings.application));
    info!("Configuration loaded");

    // Connect to PostgreSQL
    info!(
        "Connecting to database at {}...",
        mask_sensitive(&settings.database.url, 12)
    );
    let pool = repositories::connect(&settings.database).await?;

    // Run migrations
    info!("Running database migrations...");
    repositories::run_migrations(&pool).await?;

    info!("Persistence core ready, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down, closing database pool");
    pool.close().await;

    Ok(())
}
