use sea_orm::{ ConnectOptions, Database, DatabaseConnection };

use crate::config::DatabaseConfig;
use crate::error::Result;

pub mod entity;
pub use entity::*;

mod ledger_repository;
pub use ledger_repository::PgLedgerStore;

/// Open the process-wide connection pool.
///
/// Acquisition waits at most `acquire_timeout`; a timeout surfaces as a
/// retryable `DATABASE_UNAVAILABLE` error. Callers own the returned handle
/// and must `close()` it on shutdown.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    tracing::info!(
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        idle_timeout_secs = config.idle_timeout.as_secs(),
        "Connecting to database"
    );

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;

    tracing::info!("Database connection pool established");
    Ok(db)
}
