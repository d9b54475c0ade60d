//! Event tombstone - Immutable record of a deleted event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Attendee, Event};
use crate::errors::DomainError;
use crate::value_objects::{EventId, FolderId, UserId};

/// Snapshot of an event (and its attendees) at the moment it was deleted
///
/// Tombstones are append-only: they are created once and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTombstone {
    event_id: EventId,
    event: Event,
    deleted_at: DateTime<Utc>,
    deleted_by: Option<UserId>,
}

impl EventTombstone {
    /// Snapshot `event` as deleted at `deleted_at` by `deleted_by`.
    /// Alarms are not part of the snapshot.
    pub fn of(
        event: &Event,
        deleted_at: DateTime<Utc>,
        deleted_by: Option<UserId>,
    ) -> Result<Self, DomainError> {
        let event_id = event.require_id()?;
        let snapshot = event
            .to_builder()
            .alarms(Vec::new())
            .modified(Some(deleted_at), deleted_by)
            .build()?;
        Ok(Self {
            event_id,
            event: snapshot,
            deleted_at,
            deleted_by,
        })
    }

    /// Restore a tombstone read back from storage
    #[must_use]
    pub const fn restore(
        event_id: EventId,
        event: Event,
        deleted_at: DateTime<Utc>,
        deleted_by: Option<UserId>,
    ) -> Self {
        Self {
            event_id,
            event,
            deleted_at,
            deleted_by,
        }
    }

    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    pub const fn event(&self) -> &Event {
        &self.event
    }

    pub fn attendees(&self) -> &[Attendee] {
        self.event.attendees()
    }

    pub const fn folder_id(&self) -> &FolderId {
        self.event.folder_id()
    }

    pub const fn deleted_at(&self) -> DateTime<Utc> {
        self.deleted_at
    }

    pub const fn deleted_by(&self) -> Option<UserId> {
        self.deleted_by
    }
}
