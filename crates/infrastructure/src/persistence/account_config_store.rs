//! SQLite-based account configuration store

use std::sync::Arc;

use application::ports::{AccountConfigStore, StorageError};
use chrono::Utc;
use domain::{AccountConfig, AccountId};
use rusqlite::{Connection, TransactionBehavior, params};
use tracing::{debug, instrument};

use super::connection::ConnectionPool;
use super::conversions::{datetime_to_sql, json_from_sql};
use super::error::{map_json_error, map_pool_error, map_sqlite_error};

/// Account configurations stored as one JSON document per account
#[derive(Debug, Clone)]
pub struct SqliteAccountConfigStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteAccountConfigStore {
    /// Create a new SQLite account config store
    #[must_use]
    pub const fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

impl AccountConfigStore for SqliteAccountConfigStore {
    #[instrument(skip(self), fields(account_id = %account_id))]
    fn load(&self, account_id: AccountId) -> Result<AccountConfig, StorageError> {
        let conn = self.pool.get().map_err(|e| map_pool_error(&e))?;
        load_config(&conn, account_id)
    }

    #[instrument(skip(self, change), fields(account_id = %account_id))]
    fn update(
        &self,
        account_id: AccountId,
        change: &mut dyn FnMut(&mut AccountConfig),
    ) -> Result<AccountConfig, StorageError> {
        let mut conn = self.pool.get().map_err(|e| map_pool_error(&e))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sqlite_error)?;

        let mut config = load_config(&tx, account_id)?;
        change(&mut config);
        let document = serde_json::to_string(&config).map_err(|e| map_json_error(&e))?;

        tx.execute(
            "INSERT INTO account_config (account_id, config, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(account_id) DO UPDATE SET
                config = excluded.config,
                updated_at = excluded.updated_at",
            params![account_id.as_i64(), document, datetime_to_sql(Utc::now())],
        )
        .map_err(map_sqlite_error)?;
        tx.commit().map_err(map_sqlite_error)?;

        debug!("Saved account config");
        Ok(config)
    }
}

fn load_config(conn: &Connection, account_id: AccountId) -> Result<AccountConfig, StorageError> {
    let document = conn.query_row(
        "SELECT config FROM account_config WHERE account_id = ?1",
        [account_id.as_i64()],
        |row| row.get::<_, String>(0),
    );

    match document {
        Ok(document) => json_from_sql(&document, 0).map_err(map_sqlite_error),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(AccountConfig::default()),
        Err(e) => Err(map_sqlite_error(e)),
    }
}
