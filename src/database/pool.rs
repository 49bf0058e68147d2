use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;

/// Creates the process-wide connection pool from `DATABASE_URL`. Called once
/// at startup; the pool travels inside `AppState` from there on.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&url)
        .await?;

    tracing::info!("Connected database pool ({} max connections)", config.max_connections);
    Ok(pool)
}

/// Lazy variant used by the CLI and tests: builds the pool without touching
/// the network until the first query runs.
pub fn connect_lazy(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/tourkit".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_lazy(&url)?;

    Ok(pool)
}
