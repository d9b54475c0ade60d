//! Shared error mapping for the SQLite persistence layer
//!
//! Busy, locked and aborted statements mean SQLite gave up on the
//! transaction; the cycle that issued them can be re-run from scratch, so
//! they surface as [`StorageError::Conflict`]. Everything else is a backend
//! failure.

use application::ports::StorageError;
use rusqlite::ErrorCode;

/// Map a rusqlite error to a storage error
pub fn map_sqlite_error(err: rusqlite::Error) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) if is_conflict(failure.code) => {
            StorageError::Conflict(err.to_string())
        },
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => {
            StorageError::Serialization(err.to_string())
        },
        _ => StorageError::Backend(err.to_string()),
    }
}

/// Map a pool checkout failure to a storage error
///
/// A timed out checkout means every connection is held by another cycle.
pub fn map_pool_error(err: &r2d2::Error) -> StorageError {
    StorageError::Conflict(format!("connection pool exhausted: {err}"))
}

/// Map a JSON column (de)serialization failure
pub fn map_json_error(err: &serde_json::Error) -> StorageError {
    StorageError::Serialization(err.to_string())
}

const fn is_conflict(code: ErrorCode) -> bool {
    matches!(
        code,
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::OperationAborted
    )
}
