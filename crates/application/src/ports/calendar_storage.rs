//! Local calendar storage ports
//!
//! The relational cache is split the same way the tables are: events,
//! attendees, alarms, plus read utilities for tombstones and detail loading.
//! A [`CalendarStorage`] bundles the four for one database connection and a
//! [`CalendarStore`] hands such bundles out, either in autocommit mode or
//! inside one explicit write transaction.

use chrono::{DateTime, Utc};
use domain::{
    Alarm, Attendee, DomainError, Event, EventId, EventTombstone, FolderId, RecurrenceId,
};
use thiserror::Error;

use crate::error::ApplicationError;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database rolled the transaction back (busy, locked, aborted)
    #[error("Transaction rolled back: {0}")]
    Conflict(String),

    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: &'static str, id: String },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl StorageError {
    /// Create a not found error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }
}

/// Criteria for [`EventStorage::search_events`]; unset criteria match all
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSearch {
    pub folder_id: Option<FolderId>,
    pub uid: Option<String>,
    pub series_id: Option<EventId>,
    pub ids: Option<Vec<EventId>>,
}

impl EventSearch {
    /// Every event of a folder
    #[must_use]
    pub fn in_folder(folder_id: &FolderId) -> Self {
        Self {
            folder_id: Some(folder_id.clone()),
            ..Self::default()
        }
    }

    /// Every event (master included) of a series
    #[must_use]
    pub fn in_series(series_id: EventId) -> Self {
        Self {
            series_id: Some(series_id),
            ..Self::default()
        }
    }

    /// Restrict to a uid
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Restrict to a set of ids
    #[must_use]
    pub fn with_ids(mut self, ids: Vec<EventId>) -> Self {
        self.ids = Some(ids);
        self
    }
}

/// Event rows and the tombstone log
pub trait EventStorage {
    /// Reserve a fresh event id
    fn next_id(&self) -> Result<EventId, StorageError>;

    /// Insert the event row (attendees and alarms are stored separately)
    fn insert_event(&self, event: &Event) -> Result<(), StorageError>;

    /// Overwrite the event row with the same id
    fn update_event(&self, event: &Event) -> Result<(), StorageError>;

    fn delete_event(&self, id: EventId) -> Result<(), StorageError>;

    /// Load an event row without attendees or alarms
    fn load_event(&self, id: EventId) -> Result<Option<Event>, StorageError>;

    /// Load the change exception of a series at a recurrence id
    fn load_exception(
        &self,
        series_id: EventId,
        recurrence_id: RecurrenceId,
    ) -> Result<Option<Event>, StorageError>;

    /// Load event rows matching `search`, ordered by start
    fn search_events(&self, search: &EventSearch) -> Result<Vec<Event>, StorageError>;

    /// Append a tombstone; existing tombstones are never overwritten
    fn insert_event_tombstone(&self, tombstone: &EventTombstone) -> Result<(), StorageError>;
}

/// Attendee rows
pub trait AttendeeStorage {
    fn load_attendees(&self, event_id: EventId) -> Result<Vec<Attendee>, StorageError>;

    fn insert_attendees(&self, event_id: EventId, attendees: &[Attendee])
    -> Result<(), StorageError>;

    /// Delete the given attendees (matched by identity)
    fn delete_attendees(&self, event_id: EventId, attendees: &[Attendee])
    -> Result<(), StorageError>;

    fn delete_all_attendees(&self, event_id: EventId) -> Result<(), StorageError>;

    fn insert_attendee_tombstones(
        &self,
        event_id: EventId,
        attendees: &[Attendee],
    ) -> Result<(), StorageError>;
}

/// Alarm rows
pub trait AlarmStorage {
    fn load_alarms(&self, event_id: EventId) -> Result<Vec<Alarm>, StorageError>;

    fn insert_alarms(&self, event_id: EventId, alarms: &[Alarm]) -> Result<(), StorageError>;

    /// Overwrite alarms matched by uid
    fn update_alarms(&self, event_id: EventId, alarms: &[Alarm]) -> Result<(), StorageError>;

    /// Delete the given alarms (matched by uid)
    fn delete_alarms(&self, event_id: EventId, alarms: &[Alarm]) -> Result<(), StorageError>;

    fn delete_all_alarms(&self, event_id: EventId) -> Result<(), StorageError>;
}

/// Read helpers spanning several tables
pub trait StorageUtilities {
    fn tombstone(&self, event_id: EventId) -> Result<Option<EventTombstone>, StorageError>;

    /// Tombstones of a folder, optionally only those written after `since`
    fn tombstones(
        &self,
        folder_id: &FolderId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventTombstone>, StorageError>;

    /// Attach attendees (and alarms, if requested) to loaded event rows
    fn load_additional_event_data(
        &self,
        events: Vec<Event>,
        with_alarms: bool,
    ) -> Result<Vec<Event>, StorageError>;
}

/// The storages of one database connection
pub trait CalendarStorage {
    fn events(&self) -> &dyn EventStorage;
    fn attendees(&self) -> &dyn AttendeeStorage;
    fn alarms(&self) -> &dyn AlarmStorage;
    fn utilities(&self) -> &dyn StorageUtilities;
}

/// Unit of storage work run against one connection
pub type StorageWork<'w> = dyn FnMut(&dyn CalendarStorage) -> Result<(), ApplicationError> + 'w;

/// Hands out [`CalendarStorage`] bound to a pooled connection
pub trait CalendarStore: Send + Sync {
    /// Run `work` in autocommit mode
    fn read(&self, work: &mut StorageWork<'_>) -> Result<(), ApplicationError>;

    /// Run `work` inside one write transaction, committed when `work`
    /// succeeds and rolled back otherwise
    fn write(&self, work: &mut StorageWork<'_>) -> Result<(), ApplicationError>;
}

/// Value-returning helpers on top of [`CalendarStore`]
pub trait CalendarStoreExt: CalendarStore {
    /// Run `work` in autocommit mode and return its result
    fn read_with<T>(
        &self,
        work: impl FnOnce(&dyn CalendarStorage) -> Result<T, ApplicationError>,
    ) -> Result<T, ApplicationError> {
        let mut work = Some(work);
        let mut output = None;
        self.read(&mut |storage| {
            if let Some(work) = work.take() {
                output = Some(work(storage)?);
            }
            Ok(())
        })?;
        output.ok_or_else(|| ApplicationError::Storage("storage work did not run".to_string()))
    }

    /// Run `work` in a write transaction and return its result
    fn write_with<T>(
        &self,
        work: impl FnOnce(&dyn CalendarStorage) -> Result<T, ApplicationError>,
    ) -> Result<T, ApplicationError> {
        let mut work = Some(work);
        let mut output = None;
        self.write(&mut |storage| {
            if let Some(work) = work.take() {
                output = Some(work(storage)?);
            }
            Ok(())
        })?;
        output.ok_or_else(|| ApplicationError::Storage("storage work did not run".to_string()))
    }
}

impl<S: CalendarStore + ?Sized> CalendarStoreExt for S {}
