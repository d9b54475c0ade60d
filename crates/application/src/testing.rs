//! In-memory fakes and fixtures for application tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use domain::{
    AccountConfig, AccountId, Alarm, Attendee, Event, EventId, EventRef, EventTombstone, FolderId,
    RecurrenceId, UserId,
};
use parking_lot::Mutex;

use crate::error::ApplicationError;
use crate::ports::{
    AccountConfigStore, AlarmStorage, AttendeeStorage, CalendarSourceError, CalendarStorage,
    CalendarStore, EventSearch, EventStorage, ExternalCalendarSource, StorageError,
    StorageUtilities, StorageWork,
};
use crate::session::CalendarSession;

// ============================================================================
// Fixtures
// ============================================================================

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap()
}

/// Session of user 7 on account 1 at [`base_time`], no alarms, no range
pub fn session() -> CalendarSession {
    CalendarSession::new(AccountId::new(1), UserId::new(7)).with_timestamp(base_time())
}

/// Half-hour external event in folder "F", `day` days after [`base_time`]
pub fn event_at(uid: &str, summary: &str, day: i64) -> Event {
    let start = base_time() + Duration::days(day);
    Event::builder(FolderId::from("F"), start, start + Duration::minutes(30))
        .uid(uid)
        .summary(summary)
        .build()
        .unwrap()
}

/// Weekly external series master in folder "F"
pub fn series_master(uid: &str, day: i64) -> Event {
    let start = base_time() + Duration::days(day);
    Event::builder(FolderId::from("F"), start, start + Duration::hours(1))
        .uid(uid)
        .summary("Weekly sync")
        .recurrence_rule(Some("FREQ=WEEKLY".to_string()))
        .build()
        .unwrap()
}

/// External change exception moving the `week`-th occurrence by an hour
pub fn exception_of(master: &Event, week: i64) -> Event {
    let occurrence = master.start() + Duration::weeks(week);
    let start = occurrence + Duration::hours(1);
    Event::builder(master.folder_id().clone(), start, start + Duration::hours(1))
        .maybe_uid(master.uid().map(str::to_string))
        .summary(format!("{} (moved)", master.summary().unwrap_or_default()))
        .recurrence_id(Some(RecurrenceId::new(occurrence)))
        .build()
        .unwrap()
}

// ============================================================================
// External source
// ============================================================================

/// External source serving a fixed snapshot
#[derive(Debug, Default)]
pub struct StaticSource {
    events: Mutex<Vec<Event>>,
}

impl StaticSource {
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }

    pub fn set_events(&self, events: Vec<Event>) {
        *self.events.lock() = events;
    }
}

impl ExternalCalendarSource for StaticSource {
    fn events_in_folder(&self, folder_id: &FolderId) -> Result<Vec<Event>, CalendarSourceError> {
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| e.folder_id() == folder_id)
            .cloned()
            .collect())
    }

    fn events(&self, refs: &[EventRef]) -> Result<Vec<Event>, CalendarSourceError> {
        let folders: HashSet<&FolderId> = refs.iter().map(|r| &r.folder_id).collect();
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| folders.contains(e.folder_id()))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Account configuration
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryAccountConfigStore {
    configs: Mutex<HashMap<AccountId, AccountConfig>>,
    fail_updates: AtomicBool,
}

impl InMemoryAccountConfigStore {
    pub fn config(&self, account_id: AccountId) -> AccountConfig {
        self.configs
            .lock()
            .get(&account_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn replace(&self, account_id: AccountId, config: AccountConfig) {
        self.configs.lock().insert(account_id, config);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

impl AccountConfigStore for InMemoryAccountConfigStore {
    fn load(&self, account_id: AccountId) -> Result<AccountConfig, StorageError> {
        Ok(self.config(account_id))
    }

    fn update(
        &self,
        account_id: AccountId,
        change: &mut dyn FnMut(&mut AccountConfig),
    ) -> Result<AccountConfig, StorageError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("config store unavailable".to_string()));
        }
        let mut configs = self.configs.lock();
        let config = configs.entry(account_id).or_default();
        change(config);
        Ok(config.clone())
    }
}

// ============================================================================
// Calendar storage
// ============================================================================

#[derive(Debug, Default, Clone)]
struct State {
    next_id: i64,
    next_alarm_id: i64,
    events: BTreeMap<EventId, Event>,
    attendees: BTreeMap<EventId, Vec<Attendee>>,
    alarms: BTreeMap<EventId, Vec<Alarm>>,
    tombstones: Vec<EventTombstone>,
    attendee_tombstones: Vec<(EventId, Attendee)>,
}

/// Calendar store keeping all tables in memory.
/// Failed writes restore the state from before the transaction.
#[derive(Debug, Default)]
pub struct InMemoryCalendarStore {
    state: Mutex<State>,
    fail_event_deletes: AtomicBool,
    writes: AtomicUsize,
    rolled_back: AtomicUsize,
}

impl InMemoryCalendarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an event with a preset id, bypassing the caching handlers
    pub fn put(&self, event: Event) {
        let id = event.require_id().unwrap();
        let mut state = self.state.lock();
        state.next_id = state.next_id.max(id.as_i64());
        state.attendees.insert(id, event.attendees().to_vec());
        state.alarms.insert(id, event.alarms().to_vec());
        state.events.insert(id, row_of(&event).unwrap());
    }

    /// Stored event rows ordered by id
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.values().cloned().collect()
    }

    pub fn event(&self, id: EventId) -> Option<Event> {
        self.state.lock().events.get(&id).cloned()
    }

    pub fn attendees(&self, id: EventId) -> Vec<Attendee> {
        self.state.lock().attendees.get(&id).cloned().unwrap_or_default()
    }

    pub fn alarms(&self, id: EventId) -> Vec<Alarm> {
        self.state.lock().alarms.get(&id).cloned().unwrap_or_default()
    }

    pub fn tombstones(&self) -> Vec<EventTombstone> {
        self.state.lock().tombstones.clone()
    }

    pub fn attendee_tombstones(&self, id: EventId) -> Vec<Attendee> {
        self.state
            .lock()
            .attendee_tombstones
            .iter()
            .filter(|(event_id, _)| *event_id == id)
            .map(|(_, attendee)| attendee.clone())
            .collect()
    }

    /// Make event row deletes fail like a locked database
    pub fn fail_event_deletes(&self, fail: bool) {
        self.fail_event_deletes.store(fail, Ordering::SeqCst);
    }

    /// Committed write transactions
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn rolled_back_count(&self) -> usize {
        self.rolled_back.load(Ordering::SeqCst)
    }
}

impl CalendarStore for InMemoryCalendarStore {
    fn read(&self, work: &mut StorageWork<'_>) -> Result<(), ApplicationError> {
        work(&InMemoryStorage { store: self })
    }

    fn write(&self, work: &mut StorageWork<'_>) -> Result<(), ApplicationError> {
        let snapshot = self.state.lock().clone();
        let result = work(&InMemoryStorage { store: self });
        if result.is_ok() {
            self.writes.fetch_add(1, Ordering::SeqCst);
        } else {
            *self.state.lock() = snapshot;
            self.rolled_back.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

fn row_of(event: &Event) -> Result<Event, StorageError> {
    Ok(event
        .to_builder()
        .attendees(Vec::new())
        .alarms(Vec::new())
        .build()?)
}

struct InMemoryStorage<'s> {
    store: &'s InMemoryCalendarStore,
}

impl InMemoryStorage<'_> {
    fn state(&self) -> parking_lot::MutexGuard<'_, State> {
        self.store.state.lock()
    }
}

impl CalendarStorage for InMemoryStorage<'_> {
    fn events(&self) -> &dyn EventStorage {
        self
    }

    fn attendees(&self) -> &dyn AttendeeStorage {
        self
    }

    fn alarms(&self) -> &dyn AlarmStorage {
        self
    }

    fn utilities(&self) -> &dyn StorageUtilities {
        self
    }
}

impl EventStorage for InMemoryStorage<'_> {
    fn next_id(&self) -> Result<EventId, StorageError> {
        let mut state = self.state();
        state.next_id += 1;
        Ok(EventId::new(state.next_id))
    }

    fn insert_event(&self, event: &Event) -> Result<(), StorageError> {
        let id = event.require_id()?;
        let row = row_of(event)?;
        let mut state = self.state();
        if state.events.contains_key(&id) {
            return Err(StorageError::Backend(format!("duplicate event id {id}")));
        }
        state.events.insert(id, row);
        Ok(())
    }

    fn update_event(&self, event: &Event) -> Result<(), StorageError> {
        let id = event.require_id()?;
        let row = row_of(event)?;
        let mut state = self.state();
        match state.events.get_mut(&id) {
            Some(stored) => {
                *stored = row;
                Ok(())
            },
            None => Err(StorageError::not_found("Event", id.to_string())),
        }
    }

    fn delete_event(&self, id: EventId) -> Result<(), StorageError> {
        if self.store.fail_event_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Conflict("database is locked".to_string()));
        }
        self.state().events.remove(&id);
        Ok(())
    }

    fn load_event(&self, id: EventId) -> Result<Option<Event>, StorageError> {
        Ok(self.state().events.get(&id).cloned())
    }

    fn load_exception(
        &self,
        series_id: EventId,
        recurrence_id: RecurrenceId,
    ) -> Result<Option<Event>, StorageError> {
        Ok(self
            .state()
            .events
            .values()
            .find(|e| {
                e.series_id() == Some(series_id)
                    && e.id() != Some(series_id)
                    && e.recurrence_id() == Some(recurrence_id)
            })
            .cloned())
    }

    fn search_events(&self, search: &EventSearch) -> Result<Vec<Event>, StorageError> {
        let mut found: Vec<Event> = self
            .state()
            .events
            .values()
            .filter(|e| search.folder_id.as_ref().is_none_or(|f| e.folder_id() == f))
            .filter(|e| search.uid.as_deref().is_none_or(|uid| e.uid() == Some(uid)))
            .filter(|e| search.series_id.is_none_or(|s| e.series_id() == Some(s)))
            .filter(|e| {
                search
                    .ids
                    .as_ref()
                    .is_none_or(|ids| e.id().is_some_and(|id| ids.contains(&id)))
            })
            .cloned()
            .collect();
        found.sort_by_key(|e| (e.start(), e.id()));
        Ok(found)
    }

    fn insert_event_tombstone(&self, tombstone: &EventTombstone) -> Result<(), StorageError> {
        let mut state = self.state();
        if !state
            .tombstones
            .iter()
            .any(|t| t.event_id() == tombstone.event_id())
        {
            state.tombstones.push(tombstone.clone());
        }
        Ok(())
    }
}

impl AttendeeStorage for InMemoryStorage<'_> {
    fn load_attendees(&self, event_id: EventId) -> Result<Vec<Attendee>, StorageError> {
        Ok(self
            .state()
            .attendees
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }

    fn insert_attendees(&self, event_id: EventId, attendees: &[Attendee]) -> Result<(), StorageError> {
        self.state()
            .attendees
            .entry(event_id)
            .or_default()
            .extend_from_slice(attendees);
        Ok(())
    }

    fn delete_attendees(&self, event_id: EventId, attendees: &[Attendee]) -> Result<(), StorageError> {
        let gone: HashSet<String> = attendees.iter().map(Attendee::identity).collect();
        if let Some(stored) = self.state().attendees.get_mut(&event_id) {
            stored.retain(|a| !gone.contains(&a.identity()));
        }
        Ok(())
    }

    fn delete_all_attendees(&self, event_id: EventId) -> Result<(), StorageError> {
        self.state().attendees.remove(&event_id);
        Ok(())
    }

    fn insert_attendee_tombstones(
        &self,
        event_id: EventId,
        attendees: &[Attendee],
    ) -> Result<(), StorageError> {
        self.state()
            .attendee_tombstones
            .extend(attendees.iter().map(|a| (event_id, a.clone())));
        Ok(())
    }
}

impl AlarmStorage for InMemoryStorage<'_> {
    fn load_alarms(&self, event_id: EventId) -> Result<Vec<Alarm>, StorageError> {
        Ok(self
            .state()
            .alarms
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }

    fn insert_alarms(&self, event_id: EventId, alarms: &[Alarm]) -> Result<(), StorageError> {
        let mut state = self.state();
        let mut stored = Vec::with_capacity(alarms.len());
        for alarm in alarms {
            state.next_alarm_id += 1;
            stored.push(Alarm {
                id: Some(state.next_alarm_id),
                ..alarm.clone()
            });
        }
        state.alarms.entry(event_id).or_default().extend(stored);
        Ok(())
    }

    fn update_alarms(&self, event_id: EventId, alarms: &[Alarm]) -> Result<(), StorageError> {
        let mut state = self.state();
        let stored = state.alarms.entry(event_id).or_default();
        for alarm in alarms {
            if let Some(existing) = stored.iter_mut().find(|a| a.uid == alarm.uid) {
                *existing = Alarm {
                    id: existing.id,
                    ..alarm.clone()
                };
            }
        }
        Ok(())
    }

    fn delete_alarms(&self, event_id: EventId, alarms: &[Alarm]) -> Result<(), StorageError> {
        let gone: HashSet<&str> = alarms.iter().map(|a| a.uid.as_str()).collect();
        if let Some(stored) = self.state().alarms.get_mut(&event_id) {
            stored.retain(|a| !gone.contains(a.uid.as_str()));
        }
        Ok(())
    }

    fn delete_all_alarms(&self, event_id: EventId) -> Result<(), StorageError> {
        self.state().alarms.remove(&event_id);
        Ok(())
    }
}

impl StorageUtilities for InMemoryStorage<'_> {
    fn tombstone(&self, event_id: EventId) -> Result<Option<EventTombstone>, StorageError> {
        Ok(self
            .state()
            .tombstones
            .iter()
            .find(|t| t.event_id() == event_id)
            .cloned())
    }

    fn tombstones(
        &self,
        folder_id: &FolderId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventTombstone>, StorageError> {
        Ok(self
            .state()
            .tombstones
            .iter()
            .filter(|t| t.folder_id() == folder_id)
            .filter(|t| since.is_none_or(|since| t.deleted_at() > since))
            .cloned()
            .collect())
    }

    fn load_additional_event_data(
        &self,
        events: Vec<Event>,
        with_alarms: bool,
    ) -> Result<Vec<Event>, StorageError> {
        let mut loaded = Vec::with_capacity(events.len());
        for event in events {
            let id = event.require_id()?;
            let mut builder = event.to_builder().attendees(self.load_attendees(id)?);
            if with_alarms {
                builder = builder.alarms(self.load_alarms(id)?);
            }
            loaded.push(builder.build()?);
        }
        Ok(loaded)
    }
}
