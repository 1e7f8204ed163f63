use sqlx::postgres::{PgPool, PgPoolOptions};
use crate::config::DatabaseConfig;
use anyhow::Result;

pub use catalog_store::*;
pub use memory::*;
pub use pool::*;
pub use postgres::*;

pub mod catalog_store;
pub mod memory;
pub mod pool;
pub mod postgres;

/// Connect to Postgres at `url` with the pool sizing from `config`.
pub async fn create_pool(config: &DatabaseConfig, url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(url)
        .await?;

    // Test connection
    health_check(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))
}
