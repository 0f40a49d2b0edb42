//! Database initialization

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

use crate::Config;

/// Initialize database connection pool
///
/// The schema is owned by the application that writes tasks and files;
/// this service never runs migrations.
pub async fn init_database(config: &Config) -> Result<PgPool> {
    info!("Connecting to database");

    let pool: PgPool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_seconds))
        .connect(config.database_url())
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            anyhow::anyhow!("Database connection failed: {}", e)
        })?;

    // Schema is managed elsewhere; check the table the jobs start from.
    sqlx::query("SELECT 1 FROM tasks LIMIT 1")
        .execute(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database is reachable but the tasks table is not: {e}"))?;

    info!(
        max_connections = config.database.max_connections,
        "Database connected successfully"
    );

    Ok(pool)
}
