//! Connection pool and schema migrations.

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors while opening the database.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("No database URL configured")]
    NotConfigured,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Opens a pool sized and timed by configuration, applying migrations
/// when `run_migrations` is set. Every connection carries the configured
/// `statement_timeout`.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let url = config.url().ok_or(DatabaseError::NotConfigured)?;
    let options = PgConnectOptions::from_str(url)
        .map_err(|e| DatabaseError::Connection(e.to_string()))?
        .options([("statement_timeout", config.statement_timeout_ms.to_string())]);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;

    info!(
        max_connections = config.max_connections,
        statement_timeout_ms = config.statement_timeout_ms,
        "Database pool opened"
    );

    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    info!("Database migrations complete");
    Ok(())
}
