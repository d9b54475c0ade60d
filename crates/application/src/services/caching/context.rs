//! Helpers shared by the caching handlers
//!
//! Holds the collaborators of one caching request and implements the
//! storage steps every strategy is built from: loading the cached side,
//! grouped insertion of new events, and the cascading per-event delete.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use domain::{AccountConfig, Event, EventId, EventTombstone, FolderId, RecurrenceId};
use tracing::{debug, instrument, warn};

use crate::error::ApplicationError;
use crate::ports::{
    AccountConfigStore, CalendarStorage, CalendarStore, CalendarStoreExt, EventSearch,
    ExternalCalendarSource,
};
use crate::services::event_diff::{DiffEngine, DiffPolicy};
use crate::services::range_filter::RangeFilter;
use crate::session::CalendarSession;

/// Events deleted during one apply step
#[derive(Debug, Default)]
pub struct DeletionLog {
    deleted: HashSet<EventId>,
    exceptions: BTreeMap<EventId, BTreeSet<RecurrenceId>>,
}

impl DeletionLog {
    pub fn contains(&self, id: EventId) -> bool {
        self.deleted.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty()
    }

    fn contains_exception(&self, series_id: EventId, recurrence_id: RecurrenceId) -> bool {
        self.exceptions
            .get(&series_id)
            .is_some_and(|dates| dates.contains(&recurrence_id))
    }

    fn record(&mut self, id: EventId, event: &Event) {
        self.deleted.insert(id);
        if let (Some(series_id), Some(recurrence_id)) = (event.series_id(), event.recurrence_id())
            && series_id != id
        {
            self.exceptions
                .entry(series_id)
                .or_default()
                .insert(recurrence_id);
        }
    }
}

/// Collaborators and shared steps of one caching request
#[derive(Clone)]
pub struct CacheContext<'a> {
    session: &'a CalendarSession,
    source: &'a dyn ExternalCalendarSource,
    store: &'a dyn CalendarStore,
    configs: &'a dyn AccountConfigStore,
    diff: DiffEngine,
}

impl fmt::Debug for CacheContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheContext")
            .field("account_id", &self.session.account_id())
            .field("diff", &self.diff)
            .finish_non_exhaustive()
    }
}

impl<'a> CacheContext<'a> {
    pub fn new(
        session: &'a CalendarSession,
        source: &'a dyn ExternalCalendarSource,
        store: &'a dyn CalendarStore,
        configs: &'a dyn AccountConfigStore,
    ) -> Self {
        let policy =
            DiffPolicy::reconciliation().with_alarms(session.capabilities().supports_alarms);
        Self {
            session,
            source,
            store,
            configs,
            diff: DiffEngine::new(policy),
        }
    }

    pub const fn session(&self) -> &'a CalendarSession {
        self.session
    }

    pub const fn store(&self) -> &'a dyn CalendarStore {
        self.store
    }

    pub const fn diff_engine(&self) -> &DiffEngine {
        &self.diff
    }

    pub fn range_filter(&self) -> RangeFilter {
        RangeFilter::new(self.session.range())
    }

    fn supports_alarms(&self) -> bool {
        self.session.capabilities().supports_alarms
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Fetch the external snapshot of a folder, restricted to the session range
    #[instrument(skip(self), fields(folder = %folder_id))]
    pub fn fetch_external(&self, folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError> {
        let events = self.source.events_in_folder(folder_id)?;
        let fetched = events.len();
        let events = self.range_filter().apply(events);
        debug!(fetched, kept = events.len(), "Fetched external events");
        Ok(events)
    }

    /// Cached events of a folder within the session range, with details
    pub fn cached_events(&self, folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError> {
        self.store
            .read_with(|storage| self.load_cached(storage, folder_id, self.range_filter()))
    }

    /// Every cached event of a folder, ignoring the session range
    pub fn all_cached_events(&self, folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError> {
        self.store
            .read_with(|storage| self.load_cached(storage, folder_id, RangeFilter::default()))
    }

    fn load_cached(
        &self,
        storage: &dyn CalendarStorage,
        folder_id: &FolderId,
        filter: RangeFilter,
    ) -> Result<Vec<Event>, ApplicationError> {
        let rows = storage
            .events()
            .search_events(&EventSearch::in_folder(folder_id))?;
        let rows = filter.apply(rows);
        Ok(storage
            .utilities()
            .load_additional_event_data(rows, self.supports_alarms())?)
    }

    // ------------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------------

    /// Record the session timestamp as the folder's last update
    pub fn mark_updated(&self, folder_id: &FolderId) -> Result<(), ApplicationError> {
        let at = self.session.timestamp();
        self.configs
            .update(self.session.account_id(), &mut |config: &mut AccountConfig| {
                config.mark_updated(folder_id, at);
            })?;
        Ok(())
    }

    /// Forget the folder's last update
    pub fn clear_last_update(&self, folder_id: &FolderId) -> Result<(), ApplicationError> {
        self.configs
            .update(self.session.account_id(), &mut |config: &mut AccountConfig| {
                config.clear_last_update(folder_id);
            })?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Creating
    // ------------------------------------------------------------------------

    /// Store new events, grouped by uid with series masters first
    pub fn create_events(
        &self,
        storage: &dyn CalendarStorage,
        folder_id: &FolderId,
        events: &[Event],
    ) -> Result<Vec<EventId>, ApplicationError> {
        let mut created = Vec::with_capacity(events.len());
        for group in group_by_uid(events) {
            created.extend(self.create_group(storage, folder_id, &group)?);
        }
        Ok(created)
    }

    fn create_group(
        &self,
        storage: &dyn CalendarStorage,
        folder_id: &FolderId,
        group: &[Event],
    ) -> Result<Vec<EventId>, ApplicationError> {
        let (masters, exceptions): (Vec<&Event>, Vec<&Event>) =
            group.iter().partition(|event| !event.is_exception());

        if let Some(master) = masters.first() {
            let standalone = match master.resolvable_uid() {
                Some(uid) => find_standalone_exceptions(storage, folder_id, uid)?,
                None => Vec::new(),
            };
            let master_id = storage.events().next_id()?;
            let series_id = (master.recurrence_rule().is_some()
                || !exceptions.is_empty()
                || !standalone.is_empty())
            .then_some(master_id);
            let stored_master = self.stamp_new(master, folder_id, master_id, series_id)?;
            self.insert_with_details(storage, &stored_master)?;

            let mut created = vec![master_id];
            let mut dates =
                self.insert_exceptions(storage, folder_id, master_id, &exceptions, &mut created)?;
            for exception in standalone {
                let id = exception.require_id()?;
                let linked = exception.to_builder().series_id(Some(master_id)).build()?;
                storage.events().update_event(&linked)?;
                dates.extend(linked.recurrence_id());
                debug!(event_id = %id, series_id = %master_id, "Linked cached exception to new master");
            }
            if !dates.is_empty() {
                let with_dates = stored_master
                    .to_builder()
                    .change_exception_dates(dates)
                    .build()?;
                storage.events().update_event(&with_dates)?;
            }
            return Ok(created);
        }

        let cached_master = match exceptions.first().and_then(|e| e.resolvable_uid()) {
            Some(uid) => find_cached_master(storage, folder_id, uid)?,
            None => None,
        };
        let mut created = Vec::with_capacity(exceptions.len());
        match cached_master {
            Some(master) => {
                let master_id = master.require_id()?;
                let dates =
                    self.insert_exceptions(storage, folder_id, master_id, &exceptions, &mut created)?;
                let mut all_dates = master.change_exception_dates().clone();
                all_dates.extend(dates);
                let extended = master.to_builder().change_exception_dates(all_dates).build()?;
                storage.events().update_event(&extended)?;
                debug!(series_id = %master_id, attached = created.len(), "Attached exceptions to cached master");
            },
            None => {
                for exception in exceptions {
                    warn!(
                        event = %exception.display_key(),
                        "Change exception without series master, storing standalone"
                    );
                    let id = storage.events().next_id()?;
                    let stored = self.stamp_new(exception, folder_id, id, None)?;
                    self.insert_with_details(storage, &stored)?;
                    created.push(id);
                }
            },
        }
        Ok(created)
    }

    fn insert_exceptions(
        &self,
        storage: &dyn CalendarStorage,
        folder_id: &FolderId,
        series_id: EventId,
        exceptions: &[&Event],
        created: &mut Vec<EventId>,
    ) -> Result<BTreeSet<RecurrenceId>, ApplicationError> {
        let mut dates = BTreeSet::new();
        for exception in exceptions {
            let id = storage.events().next_id()?;
            let stored = self.stamp_new(exception, folder_id, id, Some(series_id))?;
            self.insert_with_details(storage, &stored)?;
            if let Some(recurrence_id) = stored.recurrence_id() {
                dates.insert(recurrence_id);
            }
            created.push(id);
        }
        Ok(dates)
    }

    /// Assign local identity and creation stamps to an external event
    fn stamp_new(
        &self,
        event: &Event,
        folder_id: &FolderId,
        id: EventId,
        series_id: Option<EventId>,
    ) -> Result<Event, ApplicationError> {
        let at = Some(self.session.timestamp());
        let by = Some(self.session.user_id());
        Ok(event
            .to_builder()
            .detached()
            .id(id)
            .series_id(series_id)
            .folder_id(folder_id.clone())
            .created(at, by)
            .modified(at, by)
            .calendar_user(event.calendar_user().or(by))
            .timestamp(Some(self.session.timestamp().timestamp_millis()))
            .build()?)
    }

    fn insert_with_details(
        &self,
        storage: &dyn CalendarStorage,
        event: &Event,
    ) -> Result<(), ApplicationError> {
        let id = event.require_id()?;
        storage.events().insert_event(event)?;
        if !event.attendees().is_empty() {
            storage.attendees().insert_attendees(id, event.attendees())?;
        }
        if self.supports_alarms() && !event.alarms().is_empty() {
            storage.alarms().insert_alarms(id, event.alarms())?;
        }
        debug!(event_id = %id, event = %event.display_key(), "Inserted event");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Deleting
    // ------------------------------------------------------------------------

    /// Delete events, series masters first so their exceptions go with them
    pub fn delete_events(
        &self,
        storage: &dyn CalendarStorage,
        events: &[Event],
        log: &mut DeletionLog,
    ) -> Result<(), ApplicationError> {
        let mut ordered: Vec<&Event> = events.iter().collect();
        ordered.sort_by_key(|event| !event.is_series_master());
        for event in ordered {
            self.delete_event(storage, event, log)?;
        }
        Ok(())
    }

    /// Delete one stored event
    ///
    /// Series masters first delete every persisted exception. Each event
    /// is tombstoned before its alarm, event and attendee rows go away;
    /// a failure after the tombstone write leaves the tombstone in place.
    pub fn delete_event(
        &self,
        storage: &dyn CalendarStorage,
        event: &Event,
        log: &mut DeletionLog,
    ) -> Result<(), ApplicationError> {
        let id = event.require_id()?;
        if log.contains(id) {
            return Ok(());
        }

        if event.is_series_master() {
            for &recurrence_id in event.change_exception_dates() {
                if log.contains_exception(id, recurrence_id) {
                    continue;
                }
                let exception = storage
                    .events()
                    .load_exception(id, recurrence_id)?
                    .ok_or_else(|| {
                        ApplicationError::not_found("Event exception", format!("{id}@{recurrence_id}"))
                    })?;
                self.delete_event(storage, &exception, log)?;
            }
            let strays = storage.events().search_events(&EventSearch::in_series(id))?;
            for stray in strays.iter().filter(|e| e.id() != Some(id)) {
                self.delete_event(storage, stray, log)?;
            }
        }

        let attendees = storage.attendees().load_attendees(id)?;
        let snapshot = event.to_builder().attendees(attendees.clone()).build()?;
        let tombstone = EventTombstone::of(
            &snapshot,
            self.session.timestamp(),
            Some(self.session.user_id()),
        )?;
        storage.events().insert_event_tombstone(&tombstone)?;
        if !attendees.is_empty() {
            storage
                .attendees()
                .insert_attendee_tombstones(id, &attendees)?;
        }

        if self.supports_alarms() {
            storage.alarms().delete_all_alarms(id)?;
        }
        storage.events().delete_event(id)?;
        storage.attendees().delete_all_attendees(id)?;

        log.record(id, event);
        debug!(event_id = %id, event = %event.display_key(), "Deleted event");
        Ok(())
    }

    /// Drop recurrence ids of deleted exceptions from masters that survived
    pub fn prune_exception_dates(
        &self,
        storage: &dyn CalendarStorage,
        log: &DeletionLog,
    ) -> Result<(), ApplicationError> {
        for (&series_id, dates) in &log.exceptions {
            if log.contains(series_id) {
                continue;
            }
            let Some(master) = storage.events().load_event(series_id)? else {
                continue;
            };
            let mut remaining = master.change_exception_dates().clone();
            for &recurrence_id in dates {
                if storage
                    .events()
                    .load_exception(series_id, recurrence_id)?
                    .is_none()
                {
                    remaining.remove(&recurrence_id);
                }
            }
            if &remaining != master.change_exception_dates() {
                let pruned = master
                    .to_builder()
                    .change_exception_dates(remaining)
                    .build()?;
                storage.events().update_event(&pruned)?;
                debug!(series_id = %series_id, "Pruned change exception dates");
            }
        }
        Ok(())
    }
}

/// Group events by uid, masters before exceptions. Events without a
/// resolvable uid form groups of their own.
fn group_by_uid(events: &[Event]) -> Vec<Vec<Event>> {
    let mut groups: Vec<Vec<Event>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for event in events {
        match event.resolvable_uid() {
            Some(uid) => {
                if let Some(&position) = index.get(uid) {
                    groups[position].push(event.clone());
                } else {
                    index.insert(uid, groups.len());
                    groups.push(vec![event.clone()]);
                }
            },
            None => groups.push(vec![event.clone()]),
        }
    }
    for group in &mut groups {
        group.sort_by_key(Event::recurrence_id);
    }
    groups
}

/// Cached change exceptions of `uid` that belong to no series
fn find_standalone_exceptions(
    storage: &dyn CalendarStorage,
    folder_id: &FolderId,
    uid: &str,
) -> Result<Vec<Event>, ApplicationError> {
    let candidates = storage
        .events()
        .search_events(&EventSearch::in_folder(folder_id).with_uid(uid))?;
    Ok(candidates
        .into_iter()
        .filter(|event| event.is_exception() && event.series_id().is_none())
        .collect())
}

fn find_cached_master(
    storage: &dyn CalendarStorage,
    folder_id: &FolderId,
    uid: &str,
) -> Result<Option<Event>, ApplicationError> {
    let candidates = storage
        .events()
        .search_events(&EventSearch::in_folder(folder_id).with_uid(uid))?;
    Ok(candidates.into_iter().find(Event::is_series_master))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use domain::{AccountCapabilities, Attendee, UserId};

    use super::*;
    use crate::testing::{
        InMemoryAccountConfigStore, InMemoryCalendarStore, StaticSource, event_at, exception_of,
        series_master, session,
    };

    fn stored(
        store: &InMemoryCalendarStore,
        ctx: &CacheContext<'_>,
        events: &[Event],
    ) -> Vec<EventId> {
        store
            .write_with(|storage| ctx.create_events(storage, &FolderId::from("F"), events))
            .unwrap()
    }

    #[test]
    fn series_is_linked_on_create() {
        let store = InMemoryCalendarStore::new();
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::default();
        let session = session();
        let ctx = CacheContext::new(&session, &source, &store, &configs);

        let master = series_master("weekly", 1);
        let x1 = exception_of(&master, 2);
        let x2 = exception_of(&master, 3);
        stored(&store, &ctx, &[x2.clone(), master, x1.clone()]);

        let events = store.events();
        let master = events.iter().find(|e| !e.is_exception()).unwrap();
        let master_id = master.id().unwrap();
        assert_eq!(master.series_id(), Some(master_id));
        assert_eq!(
            master.change_exception_dates(),
            &BTreeSet::from([x1.recurrence_id().unwrap(), x2.recurrence_id().unwrap()])
        );
        for exception in events.iter().filter(|e| e.is_exception()) {
            assert_eq!(exception.series_id(), Some(master_id));
        }
    }

    #[test]
    fn created_events_are_stamped_from_session() {
        let store = InMemoryCalendarStore::new();
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::default();
        let session = session();
        let ctx = CacheContext::new(&session, &source, &store, &configs);

        stored(&store, &ctx, &[event_at("abc", "Standup", 0)]);

        let event = &store.events()[0];
        assert_eq!(event.created(), Some(session.timestamp()));
        assert_eq!(event.created_by(), Some(session.user_id()));
        assert_eq!(event.last_modified(), Some(session.timestamp()));
        assert!(event.series_id().is_none());
    }

    #[test]
    fn orphan_exception_attaches_to_cached_master() {
        let store = InMemoryCalendarStore::new();
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::default();
        let session = session();
        let ctx = CacheContext::new(&session, &source, &store, &configs);

        let master = series_master("weekly", 1);
        let ids = stored(&store, &ctx, std::slice::from_ref(&master));
        let exception = exception_of(&master, 2);
        stored(&store, &ctx, std::slice::from_ref(&exception));

        let master = store.event(ids[0]).unwrap();
        assert_eq!(
            master.change_exception_dates(),
            &BTreeSet::from([exception.recurrence_id().unwrap()])
        );
        let stored_exception = store.events().into_iter().find(Event::is_exception).unwrap();
        assert_eq!(stored_exception.series_id(), Some(ids[0]));
    }

    #[test]
    fn orphan_exception_without_master_is_standalone() {
        let store = InMemoryCalendarStore::new();
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::default();
        let session = session();
        let ctx = CacheContext::new(&session, &source, &store, &configs);

        let exception = exception_of(&series_master("weekly", 1), 2);
        stored(&store, &ctx, &[exception]);

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].series_id().is_none());
    }

    #[test]
    fn new_master_links_cached_standalone_exceptions() {
        let store = InMemoryCalendarStore::new();
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::default();
        let session = session();
        let ctx = CacheContext::new(&session, &source, &store, &configs);

        let master = series_master("weekly", 1);
        let exception = exception_of(&master, 2);
        let exception_ids = stored(&store, &ctx, std::slice::from_ref(&exception));
        let master_ids = stored(&store, &ctx, &[master]);

        let master = store.event(master_ids[0]).unwrap();
        assert_eq!(master.series_id(), Some(master_ids[0]));
        assert_eq!(
            master.change_exception_dates(),
            &BTreeSet::from([exception.recurrence_id().unwrap()])
        );
        let linked = store.event(exception_ids[0]).unwrap();
        assert_eq!(linked.series_id(), Some(master_ids[0]));
    }

    #[test]
    fn alarms_skipped_without_capability() {
        let store = InMemoryCalendarStore::new();
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::default();
        let session = session();
        let ctx = CacheContext::new(&session, &source, &store, &configs);

        let event = event_at("abc", "Standup", 0)
            .to_builder()
            .alarm(domain::Alarm::new("a1", domain::AlarmTrigger::Relative(-300)))
            .build()
            .unwrap();
        let ids = stored(&store, &ctx, &[event]);
        assert!(store.alarms(ids[0]).is_empty());
    }

    #[test]
    fn cascade_delete_tombstones_whole_series() {
        let store = InMemoryCalendarStore::new();
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::default();
        let session = session().with_capabilities(AccountCapabilities::with_alarms());
        let ctx = CacheContext::new(&session, &source, &store, &configs);

        let master = series_master("weekly", 1)
            .to_builder()
            .attendee(Attendee::new("mailto:ann@example.com"))
            .alarm(domain::Alarm::new("a1", domain::AlarmTrigger::Relative(-300)))
            .build()
            .unwrap();
        let x1 = exception_of(&master, 2);
        let x2 = exception_of(&master, 3);
        let ids = stored(&store, &ctx, &[master, x1, x2]);
        let master = store.event(ids[0]).unwrap();

        let mut log = DeletionLog::default();
        store
            .write_with(|storage| ctx.delete_event(storage, &master, &mut log))
            .unwrap();

        assert_eq!(log.len(), 3);
        assert!(store.events().is_empty());
        assert!(store.alarms(ids[0]).is_empty());
        assert!(store.attendees(ids[0]).is_empty());
        let mut tombstoned: Vec<_> = store.tombstones().iter().map(EventTombstone::event_id).collect();
        tombstoned.sort();
        assert_eq!(tombstoned, ids);
        let master_tombstone = store
            .tombstones()
            .into_iter()
            .find(|t| t.event_id() == ids[0])
            .unwrap();
        assert_eq!(master_tombstone.attendees().len(), 1);
        assert_eq!(store.attendee_tombstones(ids[0]).len(), 1);
        assert_eq!(master_tombstone.deleted_by(), Some(UserId::new(7)));
    }

    #[test]
    fn cascade_delete_fails_on_missing_exception() {
        let store = InMemoryCalendarStore::new();
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::default();
        let session = session();
        let ctx = CacheContext::new(&session, &source, &store, &configs);

        let master = series_master("weekly", 1);
        let phantom = exception_of(&master, 5).recurrence_id().unwrap();
        let ids = stored(&store, &ctx, &[master]);
        let broken = store
            .event(ids[0])
            .unwrap()
            .to_builder()
            .change_exception_dates(BTreeSet::from([phantom]))
            .build()
            .unwrap();

        let result = store.write_with(|storage| {
            ctx.delete_event(storage, &broken, &mut DeletionLog::default())
        });
        assert!(matches!(result, Err(ApplicationError::NotFound { .. })));
        assert_eq!(store.events().len(), 1);
    }

    #[test]
    fn tombstone_survives_failing_row_delete() {
        let store = InMemoryCalendarStore::new();
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::default();
        let session = session();
        let ctx = CacheContext::new(&session, &source, &store, &configs);

        let ids = stored(&store, &ctx, &[event_at("abc", "Standup", 0)]);
        let event = store.event(ids[0]).unwrap();
        store.fail_event_deletes(true);

        let result = store.read_with(|storage| {
            ctx.delete_event(storage, &event, &mut DeletionLog::default())
        });
        assert!(result.is_err());
        assert_eq!(store.tombstones().len(), 1);
        assert_eq!(store.events().len(), 1);
    }

    #[test]
    fn pruning_keeps_master_consistent() {
        let store = InMemoryCalendarStore::new();
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::default();
        let session = session();
        let ctx = CacheContext::new(&session, &source, &store, &configs);

        let master = series_master("weekly", 1);
        let x1 = exception_of(&master, 2);
        let x2 = exception_of(&master, 3);
        let ids = stored(&store, &ctx, &[master, x1, x2.clone()]);
        let stored_x2 = store.event(ids[2]).unwrap();

        store
            .write_with(|storage| {
                let mut log = DeletionLog::default();
                ctx.delete_event(storage, &stored_x2, &mut log)?;
                ctx.prune_exception_dates(storage, &log)
            })
            .unwrap();

        let master = store.event(ids[0]).unwrap();
        assert_eq!(master.change_exception_dates().len(), 1);
        assert!(!master
            .change_exception_dates()
            .contains(&x2.recurrence_id().unwrap()));
    }

    #[test]
    fn cached_events_respect_session_range() {
        let store = InMemoryCalendarStore::new();
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::default();
        let session = session();
        let ctx = CacheContext::new(&session, &source, &store, &configs);
        stored(
            &store,
            &ctx,
            &[event_at("near", "Near", 0), event_at("far", "Far", 400)],
        );

        let ranged = session.clone().with_range(domain::DateRange::new(
            session.timestamp() - Duration::days(1),
            session.timestamp() + Duration::days(30),
        ));
        let ranged_ctx = CacheContext::new(&ranged, &source, &store, &configs);
        let folder = FolderId::from("F");
        assert_eq!(ranged_ctx.cached_events(&folder).unwrap().len(), 1);
        assert_eq!(ranged_ctx.all_cached_events(&folder).unwrap().len(), 2);
    }
}
