//! Update strategy - reconciliation of a cached folder

use std::collections::{BTreeSet, HashMap, HashSet};

use domain::{Alarm, Event, EventId, FolderId, RecurrenceId};
use tracing::{debug, info, instrument};

use super::{CacheContext, CachingHandler, DeletionLog};
use crate::error::ApplicationError;
use crate::ports::{CalendarStorage, CalendarStoreExt, EventSearch};
use crate::services::event_diff::{EventUpdate, EventUpdates};

/// Applies added, removed and updated events to a cached folder
#[derive(Debug)]
pub struct UpdateHandler<'a> {
    context: CacheContext<'a>,
}

impl<'a> UpdateHandler<'a> {
    pub fn new(context: CacheContext<'a>) -> Self {
        Self { context }
    }

    fn apply(
        &self,
        storage: &dyn CalendarStorage,
        folder_id: &FolderId,
        diff: &EventUpdates,
    ) -> Result<(), ApplicationError> {
        let (removed, detached) = self.detach_kept_exceptions(storage, diff)?;
        let mut log = DeletionLog::default();
        self.context.delete_events(storage, &removed, &mut log)?;

        if diff.updates_have_resolvable_uids() {
            for update in &diff.updated {
                self.update_in_place(storage, update, &detached)?;
            }
        } else {
            info!(
                updated = diff.updated.len(),
                "Updated events without resolvable uid, recreating them"
            );
            self.recreate(storage, folder_id, &diff.updated, &mut log)?;
        }

        self.context.create_events(storage, folder_id, &diff.added)?;
        self.context.prune_exception_dates(storage, &log)
    }

    /// Unlink exceptions the source still holds from removed series masters
    ///
    /// The unlinked exceptions stay cached as standalone events. Returns the
    /// removed events, masters without the released recurrence ids, and the
    /// ids of the unlinked exceptions.
    fn detach_kept_exceptions(
        &self,
        storage: &dyn CalendarStorage,
        diff: &EventUpdates,
    ) -> Result<(Vec<Event>, HashSet<EventId>), ApplicationError> {
        let removed_masters: HashSet<EventId> = diff
            .removed
            .iter()
            .filter(|event| event.is_series_master())
            .filter_map(Event::id)
            .collect();
        if removed_masters.is_empty() {
            return Ok((diff.removed.clone(), HashSet::new()));
        }

        let mut released: HashMap<EventId, BTreeSet<RecurrenceId>> = HashMap::new();
        let mut detached = HashSet::new();
        let kept = diff
            .unchanged
            .iter()
            .chain(diff.updated.iter().map(|u| &u.original));
        for exception in kept {
            let (Some(id), Some(series_id), Some(recurrence_id)) =
                (exception.id(), exception.series_id(), exception.recurrence_id())
            else {
                continue;
            };
            if series_id == id || !removed_masters.contains(&series_id) {
                continue;
            }
            let standalone = exception.to_builder().series_id(None).build()?;
            storage.events().update_event(&standalone)?;
            released.entry(series_id).or_default().insert(recurrence_id);
            detached.insert(id);
            debug!(event_id = %id, series_id = %series_id, "Detached exception from removed master");
        }

        let removed = diff
            .removed
            .iter()
            .map(|event| match event.id().and_then(|id| released.get(&id)) {
                Some(dates) => {
                    let mut remaining = event.change_exception_dates().clone();
                    remaining.retain(|date| !dates.contains(date));
                    event.to_builder().change_exception_dates(remaining).build()
                },
                None => Ok(event.clone()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((removed, detached))
    }

    /// Overwrite a cached event with its candidate, keeping the local id,
    /// series link and creation stamps
    fn update_in_place(
        &self,
        storage: &dyn CalendarStorage,
        update: &EventUpdate,
        detached: &HashSet<EventId>,
    ) -> Result<(), ApplicationError> {
        let original = &update.original;
        let id = original.require_id()?;
        let session = self.context.session();
        let linked = if detached.contains(&id) {
            None
        } else {
            original.series_id()
        };
        let series_id = if update.update.recurrence_rule().is_some() && linked.is_none() {
            Some(id)
        } else {
            linked
        };

        let updated = update
            .update
            .to_builder()
            .id(id)
            .series_id(series_id)
            .folder_id(original.folder_id().clone())
            .change_exception_dates(original.change_exception_dates().clone())
            .created(original.created(), original.created_by())
            .modified(Some(session.timestamp()), Some(session.user_id()))
            .calendar_user(original.calendar_user().or(update.update.calendar_user()))
            .timestamp(Some(session.timestamp().timestamp_millis()))
            .build()?;
        storage.events().update_event(&updated)?;

        let attendees = &update.attendee_updates;
        let stale: Vec<_> = attendees
            .removed
            .iter()
            .chain(attendees.updated.iter().map(|u| &u.original))
            .cloned()
            .collect();
        if !stale.is_empty() {
            storage.attendees().delete_attendees(id, &stale)?;
        }
        let fresh: Vec<_> = attendees
            .updated
            .iter()
            .map(|u| &u.update)
            .chain(attendees.added.iter())
            .cloned()
            .collect();
        if !fresh.is_empty() {
            storage.attendees().insert_attendees(id, &fresh)?;
        }

        if session.capabilities().supports_alarms {
            let alarms = &update.alarm_updates;
            if !alarms.removed.is_empty() {
                storage.alarms().delete_alarms(id, &alarms.removed)?;
            }
            if !alarms.updated.is_empty() {
                let changed: Vec<Alarm> = alarms
                    .updated
                    .iter()
                    .map(|u| Alarm {
                        id: u.original.id,
                        ..u.update.clone()
                    })
                    .collect();
                storage.alarms().update_alarms(id, &changed)?;
            }
            if !alarms.added.is_empty() {
                storage.alarms().insert_alarms(id, &alarms.added)?;
            }
        }

        debug!(event_id = %id, fields = ?update.updated_fields, "Updated event in place");
        Ok(())
    }

    /// Replace updated events by deleting and storing their candidates.
    /// Unchanged exceptions of a recreated master are stored again with it.
    fn recreate(
        &self,
        storage: &dyn CalendarStorage,
        folder_id: &FolderId,
        updates: &[EventUpdate],
        log: &mut DeletionLog,
    ) -> Result<(), ApplicationError> {
        let replaced: HashSet<EventId> = updates.iter().filter_map(|u| u.original.id()).collect();
        let supports_alarms = self.context.session().capabilities().supports_alarms;
        let mut candidates: Vec<Event> = updates.iter().map(|u| u.update.clone()).collect();

        for update in updates.iter().filter(|u| u.original.is_series_master()) {
            let master_id = update.original.require_id()?;
            let kept: Vec<Event> = storage
                .events()
                .search_events(&EventSearch::in_series(master_id))?
                .into_iter()
                .filter(|e| {
                    e.id()
                        .is_some_and(|id| id != master_id && !replaced.contains(&id) && !log.contains(id))
                })
                .collect();
            for exception in storage
                .utilities()
                .load_additional_event_data(kept, supports_alarms)?
            {
                candidates.push(exception.to_builder().detached().build()?);
            }
        }

        for update in updates {
            self.context.delete_event(storage, &update.original, log)?;
        }
        self.context.create_events(storage, folder_id, &candidates)?;
        Ok(())
    }
}

impl CachingHandler for UpdateHandler<'_> {
    fn context(&self) -> &CacheContext<'_> {
        &self.context
    }

    fn external_events(&self, folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError> {
        self.context.fetch_external(folder_id)
    }

    fn existing_events(&self, folder_id: &FolderId) -> Result<Vec<Event>, ApplicationError> {
        self.context.cached_events(folder_id)
    }

    #[instrument(
        skip(self, diff),
        fields(
            folder = %folder_id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            updated = diff.updated.len()
        )
    )]
    fn persist(&self, folder_id: &FolderId, diff: &EventUpdates) -> Result<(), ApplicationError> {
        if diff.is_empty() {
            debug!("Folder unchanged");
            return Ok(());
        }
        self.context
            .store()
            .write_with(|storage| self.apply(storage, folder_id, diff))
    }

    fn update_last_updated(&self, folder_id: &FolderId) -> Result<(), ApplicationError> {
        self.context.mark_updated(folder_id)
    }
}

#[cfg(test)]
mod tests {
    use domain::{AccountCapabilities, AlarmTrigger, Attendee, ParticipationStatus, RecurrenceId};

    use super::*;
    use crate::testing::{
        InMemoryAccountConfigStore, InMemoryCalendarStore, StaticSource, event_at, exception_of,
        series_master, session,
    };

    fn folder() -> FolderId {
        FolderId::from("F")
    }

    /// Seed the cache through the create path
    fn seed(store: &InMemoryCalendarStore, session: &crate::CalendarSession, events: Vec<Event>) {
        let configs = InMemoryAccountConfigStore::default();
        let source = StaticSource::with_events(events);
        let ctx = CacheContext::new(session, &source, store, &configs);
        super::super::CreateHandler::new(ctx)
            .cache_folder(&folder())
            .unwrap();
    }

    #[test]
    fn moved_standup_updates_in_place_and_adds_new_event() {
        let store = InMemoryCalendarStore::new();
        let session = session();
        store.put(
            event_at("abc", "Standup", 0)
                .to_builder()
                .id(EventId::new(10))
                .build()
                .unwrap(),
        );
        let source = StaticSource::with_events(vec![
            event_at("abc", "Standup (moved)", 0),
            event_at("xyz", "1:1", 1),
        ]);
        let configs = InMemoryAccountConfigStore::default();
        let handler = UpdateHandler::new(CacheContext::new(&session, &source, &store, &configs));

        let outcome = handler.cache_folder(&folder()).unwrap();

        assert_eq!((outcome.added, outcome.updated, outcome.removed), (1, 1, 0));
        let moved = store.event(EventId::new(10)).unwrap();
        assert_eq!(moved.summary(), Some("Standup (moved)"));
        assert_eq!(moved.last_modified(), Some(session.timestamp()));
        let new = outcome
            .events
            .iter()
            .find(|e| e.uid() == Some("xyz"))
            .unwrap();
        assert_ne!(new.id(), Some(EventId::new(10)));
    }

    #[test]
    fn repeat_cycle_is_idempotent() {
        let store = InMemoryCalendarStore::new();
        let session = session().with_capabilities(AccountCapabilities::with_alarms());
        let master = series_master("weekly", 1)
            .to_builder()
            .attendee(Attendee::new("mailto:ann@example.com"))
            .alarm(Alarm::new("a1", AlarmTrigger::Relative(-600)))
            .build()
            .unwrap();
        let events = vec![
            master.clone(),
            exception_of(&master, 2),
            event_at("abc", "Standup", 0),
        ];
        seed(&store, &session, events.clone());
        let writes = store.write_count();

        let source = StaticSource::with_events(events);
        let configs = InMemoryAccountConfigStore::default();
        let handler = UpdateHandler::new(CacheContext::new(&session, &source, &store, &configs));
        let outcome = handler.cache_folder(&folder()).unwrap();

        assert!(outcome.is_unchanged());
        assert_eq!(store.write_count(), writes);
    }

    #[test]
    fn removed_external_event_is_tombstoned() {
        let store = InMemoryCalendarStore::new();
        let session = session();
        seed(
            &store,
            &session,
            vec![event_at("abc", "Standup", 0), event_at("xyz", "1:1", 1)],
        );

        let source = StaticSource::with_events(vec![event_at("abc", "Standup", 0)]);
        let configs = InMemoryAccountConfigStore::default();
        let handler = UpdateHandler::new(CacheContext::new(&session, &source, &store, &configs));
        let outcome = handler.cache_folder(&folder()).unwrap();

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(store.tombstones().len(), 1);
        assert_eq!(store.tombstones()[0].event().uid(), Some("xyz"));
    }

    #[test]
    fn attendee_changes_are_applied() {
        let store = InMemoryCalendarStore::new();
        let session = session();
        let original = event_at("abc", "Standup", 0)
            .to_builder()
            .attendee(Attendee::new("mailto:ann@example.com"))
            .attendee(Attendee::new("mailto:bob@example.com"))
            .build()
            .unwrap();
        seed(&store, &session, vec![original]);

        let candidate = event_at("abc", "Standup", 0)
            .to_builder()
            .attendee(
                Attendee::new("mailto:ann@example.com").with_status(ParticipationStatus::Declined),
            )
            .attendee(Attendee::new("mailto:cid@example.com"))
            .build()
            .unwrap();
        let source = StaticSource::with_events(vec![candidate]);
        let configs = InMemoryAccountConfigStore::default();
        let handler = UpdateHandler::new(CacheContext::new(&session, &source, &store, &configs));
        let outcome = handler.cache_folder(&folder()).unwrap();

        let mut attendees: Vec<_> = outcome.events[0]
            .attendees()
            .iter()
            .map(|a| (a.uri.clone(), a.participation_status))
            .collect();
        attendees.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            attendees,
            vec![
                ("mailto:ann@example.com".to_string(), ParticipationStatus::Declined),
                ("mailto:cid@example.com".to_string(), ParticipationStatus::default()),
            ]
        );
    }

    #[test]
    fn alarm_changes_keep_row_ids() {
        let store = InMemoryCalendarStore::new();
        let session = session().with_capabilities(AccountCapabilities::with_alarms());
        let original = event_at("abc", "Standup", 0)
            .to_builder()
            .alarm(Alarm::new("a1", AlarmTrigger::Relative(-600)))
            .build()
            .unwrap();
        seed(&store, &session, vec![original]);
        let id = store.events()[0].id().unwrap();
        let alarm_id = store.alarms(id)[0].id;

        let candidate = event_at("abc", "Standup", 0)
            .to_builder()
            .alarm(Alarm::new("a1", AlarmTrigger::Relative(-300)))
            .build()
            .unwrap();
        let source = StaticSource::with_events(vec![candidate]);
        let configs = InMemoryAccountConfigStore::default();
        let handler = UpdateHandler::new(CacheContext::new(&session, &source, &store, &configs));
        handler.cache_folder(&folder()).unwrap();

        let alarms = store.alarms(id);
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].id, alarm_id);
        assert_eq!(alarms[0].trigger, AlarmTrigger::Relative(-300));
    }

    #[test]
    fn events_without_uid_are_recreated() {
        let store = InMemoryCalendarStore::new();
        let session = session();
        let untitled = Event::builder(
            folder(),
            session.timestamp(),
            session.timestamp() + chrono::Duration::hours(1),
        )
        .summary("Lunch")
        .build()
        .unwrap();
        seed(&store, &session, vec![untitled.clone()]);
        let old_id = store.events()[0].id().unwrap();

        let longer = untitled
            .to_builder()
            .span(
                session.timestamp(),
                session.timestamp() + chrono::Duration::hours(2),
            )
            .build()
            .unwrap();
        let source = StaticSource::with_events(vec![longer]);
        let configs = InMemoryAccountConfigStore::default();
        let handler = UpdateHandler::new(CacheContext::new(&session, &source, &store, &configs));
        let outcome = handler.cache_folder(&folder()).unwrap();

        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.events.len(), 1);
        assert_ne!(outcome.events[0].id(), Some(old_id));
        assert_eq!(store.tombstones()[0].event_id(), old_id);
    }

    #[test]
    fn removed_exception_prunes_master() {
        let store = InMemoryCalendarStore::new();
        let session = session();
        let master = series_master("weekly", 1);
        let x1 = exception_of(&master, 2);
        let x2 = exception_of(&master, 3);
        seed(&store, &session, vec![master.clone(), x1.clone(), x2]);

        let source = StaticSource::with_events(vec![master, x1.clone()]);
        let configs = InMemoryAccountConfigStore::default();
        let handler = UpdateHandler::new(CacheContext::new(&session, &source, &store, &configs));
        let outcome = handler.cache_folder(&folder()).unwrap();

        assert_eq!(outcome.removed, 1);
        let stored_master = outcome
            .events
            .iter()
            .find(|e| e.is_series_master())
            .unwrap();
        let expected: Vec<RecurrenceId> = x1.recurrence_id().into_iter().collect();
        assert_eq!(
            stored_master
                .change_exception_dates()
                .iter()
                .copied()
                .collect::<Vec<_>>(),
            expected
        );
    }

    fn stored_exception_id(store: &InMemoryCalendarStore) -> EventId {
        store
            .events()
            .into_iter()
            .find(Event::is_exception)
            .and_then(|e| e.id())
            .unwrap()
    }

    #[test]
    fn changed_exception_outlives_removed_master() {
        let store = InMemoryCalendarStore::new();
        let session = session();
        let master = series_master("weekly", 1);
        let x1 = exception_of(&master, 2);
        seed(&store, &session, vec![master, x1.clone()]);
        let x1_id = stored_exception_id(&store);

        let renamed = x1.to_builder().summary("Moved sync").build().unwrap();
        let source = StaticSource::with_events(vec![renamed]);
        let configs = InMemoryAccountConfigStore::default();
        let handler = UpdateHandler::new(CacheContext::new(&session, &source, &store, &configs));
        let outcome = handler.cache_folder(&folder()).unwrap();

        assert_eq!((outcome.removed, outcome.updated), (1, 1));
        assert_eq!(outcome.events.len(), 1);
        let kept = &outcome.events[0];
        assert_eq!(kept.id(), Some(x1_id));
        assert_eq!(kept.summary(), Some("Moved sync"));
        assert!(kept.series_id().is_none());
        assert_eq!(store.tombstones().len(), 1);

        assert!(handler.cache_folder(&folder()).unwrap().is_unchanged());
    }

    #[test]
    fn unchanged_exception_outlives_removed_master() {
        let store = InMemoryCalendarStore::new();
        let session = session();
        let master = series_master("weekly", 1);
        let x1 = exception_of(&master, 2);
        seed(&store, &session, vec![master, x1.clone()]);
        let x1_id = stored_exception_id(&store);

        let source = StaticSource::with_events(vec![x1]);
        let configs = InMemoryAccountConfigStore::default();
        let handler = UpdateHandler::new(CacheContext::new(&session, &source, &store, &configs));
        let first = handler.cache_folder(&folder()).unwrap();

        assert_eq!((first.added, first.removed, first.updated), (0, 1, 0));
        assert_eq!(first.events.len(), 1);
        assert_eq!(first.events[0].id(), Some(x1_id));
        assert!(first.events[0].series_id().is_none());
        assert_eq!(store.tombstones().len(), 1);

        let writes = store.write_count();
        assert!(handler.cache_folder(&folder()).unwrap().is_unchanged());
        assert_eq!(store.write_count(), writes);
    }

    #[test]
    fn conflict_rolls_back_whole_apply_step() {
        let store = InMemoryCalendarStore::new();
        let session = session();
        seed(&store, &session, vec![event_at("abc", "Standup", 0)]);
        store.fail_event_deletes(true);

        let source = StaticSource::with_events(vec![event_at("xyz", "1:1", 1)]);
        let configs = InMemoryAccountConfigStore::default();
        let handler = UpdateHandler::new(CacheContext::new(&session, &source, &store, &configs));
        let err = handler.cache_folder(&folder()).unwrap_err();

        assert!(err.is_retryable());
        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].uid(), Some("abc"));
        assert!(store.tombstones().is_empty());
    }
}
