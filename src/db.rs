//! Database connection and pool management for the Calendar API.
//!
//! Initializes a SeaORM connection pool with configurable size and acquire
//! timeout, retrying transient connection failures with exponential backoff.

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::AppConfig;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {source}")]
    ConnectionFailed {
        #[from]
        source: sea_orm::DbErr,
    },
    #[error("Invalid database configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Initializes the database connection pool.
///
/// Transient connection errors are retried up to five times with exponential
/// backoff before giving up.
///
/// # Examples
///
/// ```no_run
/// use calendar_api::{config::AppConfig, db::init_pool};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = AppConfig::default();
///     let db = init_pool(&config).await?;
///     // Use the database connection...
///     Ok(())
/// }
/// ```
pub async fn init_pool(cfg: &AppConfig) -> Result<DatabaseConnection> {
    if cfg.database_url.is_empty() {
        return Err(DatabaseError::InvalidConfiguration {
            message: "Database URL cannot be empty".to_string(),
        }
        .into());
    }

    let options = pool_options(cfg);

    const MAX_ATTEMPTS: u32 = 5;
    let mut backoff = Duration::from_millis(100);
    let mut last_err = None;

    for attempt in 1..=MAX_ATTEMPTS {
        match Database::connect(options.clone()).await {
            Ok(conn) => {
                log::info!("Connected to database on attempt {attempt}");
                return Ok(conn);
            }
            Err(e) => {
                if attempt < MAX_ATTEMPTS {
                    log::warn!(
                        "Database connection attempt {attempt} failed: {e}, retrying in {backoff:?}"
                    );
                    sleep(backoff).await;
                    backoff *= 2;
                }
                last_err = Some(e);
            }
        }
    }

    let source = last_err.ok_or_else(|| anyhow::anyhow!("connection retry loop ran no attempts"))?;
    log::error!("Giving up on database connection after {MAX_ATTEMPTS} attempts: {source}");
    Err(DatabaseError::ConnectionFailed { source }.into())
}

fn pool_options(cfg: &AppConfig) -> ConnectOptions {
    let mut options = ConnectOptions::new(&cfg.database_url);
    options
        .max_connections(cfg.db_max_connections)
        .acquire_timeout(Duration::from_millis(cfg.db_acquire_timeout_ms))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);
    options
}

/// Health check for the database connection.
///
/// Executes a trivial query to verify the pool can still reach the database.
pub async fn health_check(db: &DatabaseConnection) -> Result<()> {
    use sea_orm::Statement;

    let stmt = Statement::from_string(db.get_database_backend(), "SELECT 1".to_string());

    db.query_one(stmt)
        .await
        .context("Database health check failed")?;

    Ok(())
}
