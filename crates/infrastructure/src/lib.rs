//! Infrastructure layer - Adapters for external systems
//!
//! Implements the storage ports defined in the application layer on top of
//! SQLite, and provides configuration loading, logging setup and the retry
//! loop used to re-run reconciliation cycles after transient conflicts.
//! [`CalendarCache`] wires all of it into one entry point.

mod calendar_cache;
pub mod config;
pub mod persistence;
pub mod retry;
pub mod telemetry;

pub use calendar_cache::CalendarCache;
pub use config::{AppConfig, CacheConfig, DatabaseConfig, LogFormat, LoggingConfig};
pub use persistence::{
    ConnectionPool, DatabaseError, PoolAccounting, SqliteAccountConfigStore,
    SqliteCalendarStore, create_pool,
};
pub use retry::{RetryConfig, retry_conflicts};
pub use telemetry::{TelemetryError, init_logging};
