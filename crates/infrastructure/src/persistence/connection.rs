//! Database connection management
//!
//! Provides SQLite connection pooling via r2d2.

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DatabaseConfig;

/// Database errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Database not found: {0}")]
    NotFound(String),
}

/// SQLite connection pool type alias
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Pooled connection type alias
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Create a new connection pool
///
/// Every pooled connection gets the same PRAGMAs. An in-memory database is
/// private to its connection, so `:memory:` pools should hold exactly one.
pub fn create_pool(config: &DatabaseConfig) -> Result<ConnectionPool, DatabaseError> {
    info!(path = %config.path, max_connections = config.max_connections, "Creating database connection pool");

    let manager = if config.path == ":memory:" {
        SqliteConnectionManager::memory()
    } else {
        // Create parent directories if they don't exist
        if let Some(parent) = Path::new(&config.path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Migration(format!("Failed to create database directory: {e}"))
            })?;
        }
        SqliteConnectionManager::file(&config.path)
    }
    .with_init(initialize_database);

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .build(manager)?;

    if config.run_migrations {
        let conn = pool.get()?;
        crate::persistence::migrations::run_migrations(&conn)?;
    }

    debug!("Database connection pool created successfully");
    Ok(pool)
}

/// Initialize a fresh connection with basic settings
fn initialize_database(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
}
