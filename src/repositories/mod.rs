pub mod category_repository;
pub mod executor;
pub mod query;
pub mod receipt_item_repository;
pub mod receipt_repository;
pub mod row_mapper;
pub mod spending_repository;
pub mod store_repository;
pub mod unit_of_work;

pub use category_repository::CategoryRepository;
pub use executor::DbExecutor;
pub use receipt_item_repository::ReceiptItemRepository;
pub use receipt_repository::ReceiptRepository;
pub use spending_repository::SpendingRepository;
pub use store_repository::StoreRepository;
pub use unit_of_work::UnitOfWork;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DatabaseSettings;
use crate::error::{AppError, Result};

/// Database connection pool type alias.
pub type DbPool = PgPool;

/// Builds the process-wide pool. The caller owns it and closes it on shutdown.
pub async fn connect(settings: &DatabaseSettings) -> Result<DbPool> {
    let statement_timeout_ms = settings.statement_timeout_ms;

    let pool = PgPoolOptions::new()
        .max_connections(settings.pool_size)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if statement_timeout_ms > 0 {
                    conn.execute(
                        format!("SET statement_timeout = {}", statement_timeout_ms).as_str(),
                    )
                    .await?;
                }
                Ok(())
            })
        })
        .connect(&settings.url)
        .await
        .map_err(AppError::from)?;

    info!(pool_size = settings.pool_size, "Database pool established");
    Ok(pool)
}

/// Applies the bundled schema migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    info!("Migrations applied successfully");
    Ok(())
}
