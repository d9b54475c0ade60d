//! Calendar cache entry point
//!
//! Wires the SQLite stores and the caching service from an [`AppConfig`],
//! opens sessions over the configured default window and re-runs cycles
//! that lost a storage conflict.

use std::fmt;
use std::sync::Arc;

use application::ports::ExternalCalendarSource;
use application::{ApplicationError, CacheOutcome, CachingService, CalendarSession};
use chrono::{DateTime, Utc};
use domain::{AccountCapabilities, AccountId, Event, FolderId, UserId};
use tracing::{info, instrument};

use crate::config::{AppConfig, CacheConfig};
use crate::persistence::{
    DatabaseError, PoolAccounting, SqliteAccountConfigStore, SqliteCalendarStore, create_pool,
};
use crate::retry::retry_conflicts;

/// A configured calendar cache backed by one SQLite database
pub struct CalendarCache {
    service: CachingService,
    store: Arc<SqliteCalendarStore>,
    config: CacheConfig,
}

impl fmt::Debug for CalendarCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CalendarCache {
    /// Open the database named in `config` and wire the caching service
    pub fn open(
        config: &AppConfig,
        source: Arc<dyn ExternalCalendarSource>,
    ) -> Result<Self, DatabaseError> {
        let pool = Arc::new(create_pool(&config.database)?);
        let store = Arc::new(SqliteCalendarStore::new(Arc::clone(&pool)));
        let configs = Arc::new(SqliteAccountConfigStore::new(pool));
        info!(path = %config.database.path, "Calendar cache opened");
        Ok(Self {
            service: CachingService::new(source, store.clone(), configs),
            store,
            config: config.cache.clone(),
        })
    }

    /// Session at `now` covering the configured default window
    pub fn session(
        &self,
        account_id: AccountId,
        user_id: UserId,
        capabilities: AccountCapabilities,
        now: DateTime<Utc>,
    ) -> CalendarSession {
        CalendarSession::new(account_id, user_id)
            .with_capabilities(capabilities)
            .with_timestamp(now)
            .with_range(self.config.window(now))
    }

    /// The underlying service, for lookups and tombstone reads
    pub const fn service(&self) -> &CachingService {
        &self.service
    }

    /// Commit and rollback counters of the write transactions
    pub fn accounting(&self) -> &PoolAccounting {
        self.store.accounting()
    }

    /// Bring a folder up to date, re-running the cycle after conflicts
    #[instrument(skip(self, session), fields(account = %session.account_id(), folder = %folder_id))]
    pub fn refresh(
        &self,
        session: &CalendarSession,
        folder_id: &FolderId,
    ) -> Result<CacheOutcome, ApplicationError> {
        retry_conflicts(&self.config.conflict_retry(), || {
            self.service.refresh(session, folder_id)
        })
    }

    /// Drop a folder from the cache, re-running the cycle after conflicts
    #[instrument(skip(self, session), fields(account = %session.account_id(), folder = %folder_id))]
    pub fn stop_caching(
        &self,
        session: &CalendarSession,
        folder_id: &FolderId,
    ) -> Result<Vec<Event>, ApplicationError> {
        retry_conflicts(&self.config.conflict_retry(), || {
            self.service.stop_caching(session, folder_id)
        })
    }
}
