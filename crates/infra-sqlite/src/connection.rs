// SQLite Connection Pool Setup

use shiftswap_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Config(format!("Invalid database url {}: {}", database_url, e)))?
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true)
        .create_if_missing(true);

    // WAL is meaningless for in-memory databases
    if is_memory_url(database_url) {
        Ok(options)
    } else {
        Ok(options.journal_mode(SqliteJournalMode::Wal))
    }
}

fn pool_options(database_url: &str) -> SqlitePoolOptions {
    if is_memory_url(database_url) {
        // Every connection to :memory: is a separate database: keep exactly one alive
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
    }
}

/// Create SQLite connection pool with WAL mode and optimizations
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    pool_options(database_url)
        .connect_with(connect_options(database_url)?)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Create a pool that connects on first use
///
/// Lets the daemon start while the primary backend is unreachable;
/// failures surface per query and the store falls back.
pub fn create_lazy_pool(database_url: &str) -> Result<SqlitePool> {
    Ok(pool_options(database_url).connect_lazy_with(connect_options(database_url)?))
}
