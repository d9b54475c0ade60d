//! SQLite-based calendar store
//!
//! Hands out [`SqliteCalendarStorage`] bound to a pooled connection. Writes
//! run inside one `BEGIN IMMEDIATE` transaction so a reconciliation cycle
//! either lands completely or not at all.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use application::ApplicationError;
use application::ports::{CalendarStore, StorageError, StorageWork};
use rusqlite::TransactionBehavior;
use tracing::{debug, instrument, warn};

use super::calendar_storage::SqliteCalendarStorage;
use super::connection::{ConnectionPool, PooledConn};
use super::error::{map_pool_error, map_sqlite_error};

/// Outcome counters of write transactions
#[derive(Debug, Default)]
pub struct PoolAccounting {
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl PoolAccounting {
    /// Write transactions that committed
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Write transactions that were rolled back
    pub fn rolled_back(&self) -> u64 {
        self.rolled_back.load(Ordering::Relaxed)
    }

    fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }
}

/// SQLite-based calendar store
#[derive(Debug, Clone)]
pub struct SqliteCalendarStore {
    pool: Arc<ConnectionPool>,
    accounting: Arc<PoolAccounting>,
}

impl SqliteCalendarStore {
    /// Create a new SQLite calendar store
    #[must_use]
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            accounting: Arc::new(PoolAccounting::default()),
        }
    }

    /// Commit and rollback counters of this store
    pub fn accounting(&self) -> &PoolAccounting {
        &self.accounting
    }

    fn connection(&self) -> Result<PooledConn, StorageError> {
        self.pool.get().map_err(|e| map_pool_error(&e))
    }
}

impl CalendarStore for SqliteCalendarStore {
    fn read(&self, work: &mut StorageWork<'_>) -> Result<(), ApplicationError> {
        let conn = self.connection()?;
        work(&SqliteCalendarStorage::new(&conn))
    }

    #[instrument(skip_all)]
    fn write(&self, work: &mut StorageWork<'_>) -> Result<(), ApplicationError> {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sqlite_error)?;

        let result = work(&SqliteCalendarStorage::new(&tx));
        if let Err(e) = result {
            if let Err(rollback) = tx.rollback() {
                warn!(error = %rollback, "Rollback failed");
            }
            self.accounting.record_rollback();
            debug!(error = %e, "Write transaction rolled back");
            return Err(e);
        }

        if let Err(e) = tx.commit() {
            self.accounting.record_rollback();
            return Err(map_sqlite_error(e).into());
        }
        self.accounting.record_commit();
        debug!("Write transaction committed");
        Ok(())
    }
}
