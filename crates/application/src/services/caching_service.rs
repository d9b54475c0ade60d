//! Caching service
//!
//! Entry point for keeping cached calendar folders in line with the external
//! source. Picks the caching strategy for a request and serializes cycles of
//! the same folder.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::{AccountId, Event, EventId, EventRef, EventTombstone, FolderId, RecurrenceId};
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::error::ApplicationError;
use crate::ports::{AccountConfigStore, CalendarStore, CalendarStoreExt, ExternalCalendarSource};
use crate::services::caching::{CacheContext, CacheOutcome, CachingHandler, CachingStrategy};
use crate::session::CalendarSession;

/// What a caller wants done with a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Refresh,
    Reconcile,
    Drop,
}

/// Caching service for calendar folders
pub struct CachingService {
    source: Arc<dyn ExternalCalendarSource>,
    store: Arc<dyn CalendarStore>,
    configs: Arc<dyn AccountConfigStore>,
    folder_locks: Mutex<HashMap<(AccountId, FolderId), Arc<Mutex<()>>>>,
}

impl fmt::Debug for CachingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingService").finish_non_exhaustive()
    }
}

impl CachingService {
    /// Create a new caching service
    pub fn new(
        source: Arc<dyn ExternalCalendarSource>,
        store: Arc<dyn CalendarStore>,
        configs: Arc<dyn AccountConfigStore>,
    ) -> Self {
        Self {
            source,
            store,
            configs,
            folder_locks: Mutex::new(HashMap::new()),
        }
    }

    fn context<'a>(&'a self, session: &'a CalendarSession) -> CacheContext<'a> {
        CacheContext::new(
            session,
            self.source.as_ref(),
            self.store.as_ref(),
            self.configs.as_ref(),
        )
    }

    fn folder_lock(&self, account_id: AccountId, folder_id: &FolderId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.folder_locks
                .lock()
                .entry((account_id, folder_id.clone()))
                .or_default(),
        )
    }

    /// Drop the map entry once no other caller holds or waits for the lock
    fn release_folder_lock(&self, account_id: AccountId, folder_id: &FolderId, lock: Arc<Mutex<()>>) {
        let mut locks = self.folder_locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&(account_id, folder_id.clone()));
        }
    }

    /// Run one cycle for a folder while holding the folder lock
    fn run(
        &self,
        session: &CalendarSession,
        folder_id: &FolderId,
        intent: Intent,
    ) -> Result<CacheOutcome, ApplicationError> {
        let lock = self.folder_lock(session.account_id(), folder_id);
        let outcome = {
            let _guard = lock.lock();
            self.run_locked(session, folder_id, intent)
        };
        self.release_folder_lock(session.account_id(), folder_id, lock);
        outcome
    }

    fn run_locked(
        &self,
        session: &CalendarSession,
        folder_id: &FolderId,
        intent: Intent,
    ) -> Result<CacheOutcome, ApplicationError> {
        let context = self.context(session);
        let strategy = match intent {
            Intent::Refresh if self.never_cached(session, &context, folder_id)? => {
                debug!("Folder never cached, filling it");
                CachingStrategy::create(context)
            },
            Intent::Refresh | Intent::Reconcile => CachingStrategy::update(context),
            Intent::Drop => CachingStrategy::delete(context),
        };

        let outcome = strategy.cache_folder(folder_id)?;
        info!(
            strategy = strategy.name(),
            added = outcome.added,
            removed = outcome.removed,
            updated = outcome.updated,
            cached = outcome.events.len(),
            "Folder cache cycle complete"
        );
        Ok(outcome)
    }

    fn never_cached(
        &self,
        session: &CalendarSession,
        context: &CacheContext<'_>,
        folder_id: &FolderId,
    ) -> Result<bool, ApplicationError> {
        let config = self.configs.load(session.account_id())?;
        Ok(config.last_update(folder_id).is_none() && context.all_cached_events(folder_id)?.is_empty())
    }

    /// Bring a folder up to date
    ///
    /// A folder that was never synchronized and holds no cached events is
    /// filled by the create strategy, any other folder is reconciled.
    #[instrument(skip(self, session), fields(account = %session.account_id(), folder = %folder_id))]
    pub fn refresh(
        &self,
        session: &CalendarSession,
        folder_id: &FolderId,
    ) -> Result<CacheOutcome, ApplicationError> {
        self.run(session, folder_id, Intent::Refresh)
    }

    /// Reconcile a folder and return its cached events
    #[instrument(skip(self, session), fields(account = %session.account_id(), folder = %folder_id))]
    pub fn execute(
        &self,
        session: &CalendarSession,
        folder_id: &FolderId,
    ) -> Result<Vec<Event>, ApplicationError> {
        Ok(self
            .run(session, folder_id, Intent::Reconcile)?
            .events)
    }

    /// Reconcile the folders of `refs` and return the requested events
    #[instrument(skip(self, session, refs), fields(account = %session.account_id(), requested = refs.len()))]
    pub fn execute_ids(
        &self,
        session: &CalendarSession,
        refs: &[EventRef],
    ) -> Result<Vec<Event>, ApplicationError> {
        let mut by_folder: BTreeMap<&FolderId, HashSet<EventId>> = BTreeMap::new();
        for event_ref in refs {
            by_folder
                .entry(&event_ref.folder_id)
                .or_default()
                .insert(event_ref.event_id);
        }

        let mut events = Vec::new();
        for (folder_id, ids) in by_folder {
            events.extend(
                self.execute(session, folder_id)?
                    .into_iter()
                    .filter(|event| event.id().is_some_and(|id| ids.contains(&id))),
            );
        }
        Ok(events)
    }

    /// Reconcile a folder and return one event instance
    ///
    /// With a recurrence id the stored change exception is returned, or the
    /// series master when that occurrence has no exception.
    #[instrument(skip(self, session), fields(account = %session.account_id(), folder = %folder_id))]
    pub fn execute_instance(
        &self,
        session: &CalendarSession,
        folder_id: &FolderId,
        event_id: EventId,
        recurrence_id: Option<RecurrenceId>,
    ) -> Result<Event, ApplicationError> {
        self.execute(session, folder_id)?;

        let with_alarms = session.capabilities().supports_alarms;
        self.store.read_with(|storage| {
            let event = storage
                .events()
                .load_event(event_id)?
                .filter(|event| event.folder_id() == folder_id)
                .ok_or_else(|| ApplicationError::not_found("Event", event_id.to_string()))?;
            let instance = match recurrence_id {
                Some(rid) if !event.is_exception() => storage
                    .events()
                    .load_exception(event_id, rid)?
                    .unwrap_or(event),
                _ => event,
            };
            storage
                .utilities()
                .load_additional_event_data(vec![instance], with_alarms)?
                .pop()
                .ok_or_else(|| ApplicationError::not_found("Event", event_id.to_string()))
        })
    }

    /// Drop a folder from the cache and return what remains cached (nothing)
    #[instrument(skip(self, session), fields(account = %session.account_id(), folder = %folder_id))]
    pub fn stop_caching(
        &self,
        session: &CalendarSession,
        folder_id: &FolderId,
    ) -> Result<Vec<Event>, ApplicationError> {
        Ok(self
            .run(session, folder_id, Intent::Drop)?
            .events)
    }

    /// Tombstones of a folder, optionally only those written after `since`
    #[instrument(skip(self))]
    pub fn tombstones_since(
        &self,
        folder_id: &FolderId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventTombstone>, ApplicationError> {
        self.store
            .read_with(|storage| Ok(storage.utilities().tombstones(folder_id, since)?))
    }
}
