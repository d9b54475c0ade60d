//! Persistence module
//!
//! SQLite-based storage for cached calendar events, their attendees, alarms
//! and tombstones, plus per-account configuration.

mod account_config_store;
mod calendar_storage;
mod calendar_store;
pub mod connection;
mod conversions;
pub mod error;
pub mod migrations;

pub use account_config_store::SqliteAccountConfigStore;
pub use calendar_storage::SqliteCalendarStorage;
pub use calendar_store::{PoolAccounting, SqliteCalendarStore};
pub use connection::{ConnectionPool, DatabaseError, PooledConn, create_pool};
