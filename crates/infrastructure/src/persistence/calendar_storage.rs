//! SQLite-backed calendar storages
//!
//! [`SqliteCalendarStorage`] borrows one connection (plain or inside a
//! transaction) and implements every storage port on it.

use application::ports::{
    AlarmStorage, AttendeeStorage, CalendarStorage, EventSearch, EventStorage, StorageError,
    StorageUtilities,
};
use chrono::{DateTime, Utc};
use domain::{
    Alarm, Attendee, Event, EventId, EventTombstone, FolderId, RecurrenceId, UserId,
};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use tracing::{debug, instrument};

use super::conversions::{
    action_to_str, classification_to_str, cu_type_to_str, datetime_from_sql, datetime_to_sql,
    exception_dates_from_sql, exception_dates_to_sql, json_from_sql, optional_datetime_from_sql,
    participation_to_str, properties_from_sql, properties_to_sql, recurrence_id_to_sql,
    role_to_str, status_to_str, str_to_action, str_to_classification, str_to_cu_type,
    str_to_participation, str_to_role, str_to_status, str_to_transparency, transparency_to_str,
    trigger_from_sql, trigger_to_sql,
};
use super::error::{map_json_error, map_sqlite_error};

const EVENT_COLUMNS: &str = "id, uid, series_id, recurrence_id, folder_id, summary, description,
    location, start_at, end_at, all_day, recurrence_rule, change_exception_dates,
    classification, transparency, status, organizer, sequence, created_at, created_by,
    last_modified, modified_by, calendar_user, extended_properties, row_timestamp";

const ATTENDEE_COLUMNS: &str =
    "uri, common_name, email, cu_type, role, participation_status, rsvp, comment";

const ALARM_COLUMNS: &str =
    "id, uid, action, trigger_kind, trigger_value, description, acknowledged";

/// Calendar storages bound to one SQLite connection
#[derive(Debug, Clone, Copy)]
pub struct SqliteCalendarStorage<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteCalendarStorage<'c> {
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl CalendarStorage for SqliteCalendarStorage<'_> {
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

impl EventStorage for SqliteCalendarStorage<'_> {
    fn next_id(&self) -> Result<EventId, StorageError> {
        let id: i64 = self
            .conn
            .query_row(
                "UPDATE id_sequence SET value = value + 1 WHERE name = 'event' RETURNING value",
                [],
                |row| row.get(0),
            )
            .map_err(map_sqlite_error)?;
        Ok(EventId::new(id))
    }

    #[instrument(skip(self, event), fields(event = %event.display_key()))]
    fn insert_event(&self, event: &Event) -> Result<(), StorageError> {
        let id = event.require_id()?;
        let exception_dates =
            exception_dates_to_sql(event.change_exception_dates()).map_err(|e| map_json_error(&e))?;
        let properties =
            properties_to_sql(event.extended_properties()).map_err(|e| map_json_error(&e))?;

        self.conn
            .prepare_cached(&format!(
                "INSERT INTO events ({EVENT_COLUMNS}) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
                )"
            ))
            .and_then(|mut stmt| {
                stmt.execute(params![
                    id.as_i64(),
                    event.uid(),
                    event.series_id().map(|s| s.as_i64()),
                    event.recurrence_id().map(recurrence_id_to_sql),
                    event.folder_id().as_str(),
                    event.summary(),
                    event.description(),
                    event.location(),
                    datetime_to_sql(event.start()),
                    datetime_to_sql(event.end()),
                    event.all_day(),
                    event.recurrence_rule(),
                    exception_dates,
                    classification_to_str(event.classification()),
                    transparency_to_str(event.transparency()),
                    event.status().map(status_to_str),
                    event.organizer(),
                    event.sequence(),
                    event.created().map(datetime_to_sql),
                    event.created_by().map(|u| u.as_i64()),
                    event.last_modified().map(datetime_to_sql),
                    event.modified_by().map(|u| u.as_i64()),
                    event.calendar_user().map(|u| u.as_i64()),
                    properties,
                    event.timestamp(),
                ])
            })
            .map_err(map_sqlite_error)?;

        debug!(event_id = %id, "Inserted event");
        Ok(())
    }

    #[instrument(skip(self, event), fields(event = %event.display_key()))]
    fn update_event(&self, event: &Event) -> Result<(), StorageError> {
        let id = event.require_id()?;
        let exception_dates =
            exception_dates_to_sql(event.change_exception_dates()).map_err(|e| map_json_error(&e))?;
        let properties =
            properties_to_sql(event.extended_properties()).map_err(|e| map_json_error(&e))?;

        let changed = self
            .conn
            .execute(
                "UPDATE events SET
                    uid = ?2, series_id = ?3, recurrence_id = ?4, folder_id = ?5,
                    summary = ?6, description = ?7, location = ?8, start_at = ?9,
                    end_at = ?10, all_day = ?11, recurrence_rule = ?12,
                    change_exception_dates = ?13, classification = ?14,
                    transparency = ?15, status = ?16, organizer = ?17, sequence = ?18,
                    created_at = ?19, created_by = ?20, last_modified = ?21,
                    modified_by = ?22, calendar_user = ?23, extended_properties = ?24,
                    row_timestamp = ?25
                 WHERE id = ?1",
                params![
                    id.as_i64(),
                    event.uid(),
                    event.series_id().map(|s| s.as_i64()),
                    event.recurrence_id().map(recurrence_id_to_sql),
                    event.folder_id().as_str(),
                    event.summary(),
                    event.description(),
                    event.location(),
                    datetime_to_sql(event.start()),
                    datetime_to_sql(event.end()),
                    event.all_day(),
                    event.recurrence_rule(),
                    exception_dates,
                    classification_to_str(event.classification()),
                    transparency_to_str(event.transparency()),
                    event.status().map(status_to_str),
                    event.organizer(),
                    event.sequence(),
                    event.created().map(datetime_to_sql),
                    event.created_by().map(|u| u.as_i64()),
                    event.last_modified().map(datetime_to_sql),
                    event.modified_by().map(|u| u.as_i64()),
                    event.calendar_user().map(|u| u.as_i64()),
                    properties,
                    event.timestamp(),
                ],
            )
            .map_err(map_sqlite_error)?;

        if changed == 0 {
            return Err(StorageError::not_found("Event", id.to_string()));
        }
        debug!(event_id = %id, "Updated event");
        Ok(())
    }

    fn delete_event(&self, id: EventId) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM events WHERE id = ?1", [id.as_i64()])
            .map_err(map_sqlite_error)?;
        debug!(event_id = %id, "Deleted event");
        Ok(())
    }

    fn load_event(&self, id: EventId) -> Result<Option<Event>, StorageError> {
        self.conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                [id.as_i64()],
                row_to_event,
            )
            .optional()
            .map_err(map_sqlite_error)
    }

    fn load_exception(
        &self,
        series_id: EventId,
        recurrence_id: RecurrenceId,
    ) -> Result<Option<Event>, StorageError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE series_id = ?1 AND id <> ?1 AND recurrence_id = ?2"
                ),
                params![series_id.as_i64(), recurrence_id_to_sql(recurrence_id)],
                row_to_event,
            )
            .optional()
            .map_err(map_sqlite_error)
    }

    #[instrument(skip(self))]
    fn search_events(&self, search: &EventSearch) -> Result<Vec<Event>, StorageError> {
        let ids = search
            .ids
            .as_ref()
            .map(|ids| serde_json::to_string(&ids.iter().map(EventId::as_i64).collect::<Vec<_>>()))
            .transpose()
            .map_err(|e| map_json_error(&e))?;

        let mut stmt = self
            .conn
            .prepare_cached(&format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE (?1 IS NULL OR folder_id = ?1)
                   AND (?2 IS NULL OR uid = ?2)
                   AND (?3 IS NULL OR series_id = ?3)
                   AND (?4 IS NULL OR id IN (SELECT value FROM json_each(?4)))
                 ORDER BY start_at, id"
            ))
            .map_err(map_sqlite_error)?;

        let events = stmt
            .query_map(
                params![
                    search.folder_id.as_ref().map(FolderId::as_str),
                    search.uid,
                    search.series_id.map(|s| s.as_i64()),
                    ids,
                ],
                row_to_event,
            )
            .and_then(Iterator::collect::<rusqlite::Result<Vec<_>>>)
            .map_err(map_sqlite_error)?;

        Ok(events)
    }

    fn insert_event_tombstone(&self, tombstone: &EventTombstone) -> Result<(), StorageError> {
        let snapshot = serde_json::to_string(tombstone.event()).map_err(|e| map_json_error(&e))?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO event_tombstones
                    (event_id, folder_id, event, deleted_at, deleted_by)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    tombstone.event_id().as_i64(),
                    tombstone.folder_id().as_str(),
                    snapshot,
                    datetime_to_sql(tombstone.deleted_at()),
                    tombstone.deleted_by().map(|u| u.as_i64()),
                ],
            )
            .map_err(map_sqlite_error)?;
        debug!(event_id = %tombstone.event_id(), "Wrote event tombstone");
        Ok(())
    }
}

impl AttendeeStorage for SqliteCalendarStorage<'_> {
    fn load_attendees(&self, event_id: EventId) -> Result<Vec<Attendee>, StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!(
                "SELECT {ATTENDEE_COLUMNS} FROM attendees WHERE event_id = ?1 ORDER BY id"
            ))
            .map_err(map_sqlite_error)?;

        stmt.query_map([event_id.as_i64()], row_to_attendee)
            .and_then(Iterator::collect)
            .map_err(map_sqlite_error)
    }

    fn insert_attendees(
        &self,
        event_id: EventId,
        attendees: &[Attendee],
    ) -> Result<(), StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!(
                "INSERT INTO attendees (event_id, identity, {ATTENDEE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ))
            .map_err(map_sqlite_error)?;

        for attendee in attendees {
            stmt.execute(params![
                event_id.as_i64(),
                attendee.identity(),
                attendee.uri,
                attendee.common_name,
                attendee.email,
                cu_type_to_str(attendee.cu_type),
                role_to_str(attendee.role),
                participation_to_str(attendee.participation_status),
                attendee.rsvp,
                attendee.comment,
            ])
            .map_err(map_sqlite_error)?;
        }
        Ok(())
    }

    fn delete_attendees(
        &self,
        event_id: EventId,
        attendees: &[Attendee],
    ) -> Result<(), StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM attendees WHERE event_id = ?1 AND identity = ?2")
            .map_err(map_sqlite_error)?;

        for attendee in attendees {
            stmt.execute(params![event_id.as_i64(), attendee.identity()])
                .map_err(map_sqlite_error)?;
        }
        Ok(())
    }

    fn delete_all_attendees(&self, event_id: EventId) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM attendees WHERE event_id = ?1", [event_id.as_i64()])
            .map_err(map_sqlite_error)?;
        Ok(())
    }

    fn insert_attendee_tombstones(
        &self,
        event_id: EventId,
        attendees: &[Attendee],
    ) -> Result<(), StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO attendee_tombstones (event_id, identity, attendee) VALUES (?1, ?2, ?3)",
            )
            .map_err(map_sqlite_error)?;

        for attendee in attendees {
            let snapshot = serde_json::to_string(attendee).map_err(|e| map_json_error(&e))?;
            stmt.execute(params![event_id.as_i64(), attendee.identity(), snapshot])
                .map_err(map_sqlite_error)?;
        }
        Ok(())
    }
}

impl AlarmStorage for SqliteCalendarStorage<'_> {
    fn load_alarms(&self, event_id: EventId) -> Result<Vec<Alarm>, StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!(
                "SELECT {ALARM_COLUMNS} FROM alarms WHERE event_id = ?1 ORDER BY id"
            ))
            .map_err(map_sqlite_error)?;

        stmt.query_map([event_id.as_i64()], row_to_alarm)
            .and_then(Iterator::collect)
            .map_err(map_sqlite_error)
    }

    fn insert_alarms(&self, event_id: EventId, alarms: &[Alarm]) -> Result<(), StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO alarms
                    (event_id, uid, action, trigger_kind, trigger_value, description, acknowledged)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(map_sqlite_error)?;

        for alarm in alarms {
            let (kind, value) = trigger_to_sql(alarm.trigger);
            stmt.execute(params![
                event_id.as_i64(),
                alarm.uid,
                action_to_str(alarm.action),
                kind,
                value,
                alarm.description,
                alarm.acknowledged.map(datetime_to_sql),
            ])
            .map_err(map_sqlite_error)?;
        }
        Ok(())
    }

    fn update_alarms(&self, event_id: EventId, alarms: &[Alarm]) -> Result<(), StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "UPDATE alarms SET
                    action = ?3, trigger_kind = ?4, trigger_value = ?5,
                    description = ?6, acknowledged = ?7
                 WHERE event_id = ?1 AND uid = ?2",
            )
            .map_err(map_sqlite_error)?;

        for alarm in alarms {
            let (kind, value) = trigger_to_sql(alarm.trigger);
            stmt.execute(params![
                event_id.as_i64(),
                alarm.uid,
                action_to_str(alarm.action),
                kind,
                value,
                alarm.description,
                alarm.acknowledged.map(datetime_to_sql),
            ])
            .map_err(map_sqlite_error)?;
        }
        Ok(())
    }

    fn delete_alarms(&self, event_id: EventId, alarms: &[Alarm]) -> Result<(), StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM alarms WHERE event_id = ?1 AND uid = ?2")
            .map_err(map_sqlite_error)?;

        for alarm in alarms {
            stmt.execute(params![event_id.as_i64(), alarm.uid])
                .map_err(map_sqlite_error)?;
        }
        Ok(())
    }

    fn delete_all_alarms(&self, event_id: EventId) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM alarms WHERE event_id = ?1", [event_id.as_i64()])
            .map_err(map_sqlite_error)?;
        Ok(())
    }
}

impl StorageUtilities for SqliteCalendarStorage<'_> {
    fn tombstone(&self, event_id: EventId) -> Result<Option<EventTombstone>, StorageError> {
        self.conn
            .query_row(
                "SELECT event_id, event, deleted_at, deleted_by
                 FROM event_tombstones WHERE event_id = ?1",
                [event_id.as_i64()],
                row_to_tombstone,
            )
            .optional()
            .map_err(map_sqlite_error)
    }

    #[instrument(skip(self), fields(folder = %folder_id))]
    fn tombstones(
        &self,
        folder_id: &FolderId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventTombstone>, StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT event_id, event, deleted_at, deleted_by
                 FROM event_tombstones
                 WHERE folder_id = ?1 AND (?2 IS NULL OR deleted_at > ?2)
                 ORDER BY deleted_at, event_id",
            )
            .map_err(map_sqlite_error)?;

        stmt.query_map(
            params![folder_id.as_str(), since.map(datetime_to_sql)],
            row_to_tombstone,
        )
        .and_then(Iterator::collect)
        .map_err(map_sqlite_error)
    }

    fn load_additional_event_data(
        &self,
        events: Vec<Event>,
        with_alarms: bool,
    ) -> Result<Vec<Event>, StorageError> {
        events
            .into_iter()
            .map(|event| {
                let id = event.require_id()?;
                let mut builder = event.to_builder().attendees(self.load_attendees(id)?);
                if with_alarms {
                    builder = builder.alarms(self.load_alarms(id)?);
                }
                Ok(builder.build()?)
            })
            .collect()
    }
}

/// Convert a database row to an `Event` (without attendees and alarms)
fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    let id: i64 = row.get(0)?;
    let recurrence_id: Option<String> = row.get(3)?;
    let folder_id: String = row.get(4)?;
    let start: String = row.get(8)?;
    let end: String = row.get(9)?;
    let exception_dates: String = row.get(12)?;
    let classification: String = row.get(13)?;
    let transparency: String = row.get(14)?;
    let status: Option<String> = row.get(15)?;
    let properties: String = row.get(23)?;

    Event::builder(
        FolderId::new(folder_id),
        datetime_from_sql(&start, 8)?,
        datetime_from_sql(&end, 9)?,
    )
    .id(EventId::new(id))
    .maybe_uid(row.get(1)?)
    .series_id(row.get::<_, Option<i64>>(2)?.map(EventId::new))
    .recurrence_id(optional_datetime_from_sql(recurrence_id, 3)?.map(RecurrenceId::new))
    .maybe_summary(row.get(5)?)
    .description(row.get(6)?)
    .location(row.get(7)?)
    .all_day(row.get(10)?)
    .recurrence_rule(row.get(11)?)
    .change_exception_dates(exception_dates_from_sql(&exception_dates, 12)?)
    .classification(str_to_classification(&classification))
    .transparency(str_to_transparency(&transparency))
    .status(status.as_deref().and_then(str_to_status))
    .organizer(row.get(16)?)
    .sequence(row.get(17)?)
    .created(
        optional_datetime_from_sql(row.get(18)?, 18)?,
        row.get::<_, Option<i64>>(19)?.map(UserId::new),
    )
    .modified(
        optional_datetime_from_sql(row.get(20)?, 20)?,
        row.get::<_, Option<i64>>(21)?.map(UserId::new),
    )
    .calendar_user(row.get::<_, Option<i64>>(22)?.map(UserId::new))
    .extended_properties(properties_from_sql(&properties, 23)?)
    .timestamp(row.get(24)?)
    .build()
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))
}

fn row_to_attendee(row: &Row<'_>) -> rusqlite::Result<Attendee> {
    let cu_type: String = row.get(3)?;
    let role: String = row.get(4)?;
    let participation_status: String = row.get(5)?;

    Ok(Attendee {
        uri: row.get(0)?,
        common_name: row.get(1)?,
        email: row.get(2)?,
        cu_type: str_to_cu_type(&cu_type),
        role: str_to_role(&role),
        participation_status: str_to_participation(&participation_status),
        rsvp: row.get(6)?,
        comment: row.get(7)?,
    })
}

fn row_to_alarm(row: &Row<'_>) -> rusqlite::Result<Alarm> {
    let action: String = row.get(2)?;
    let trigger_kind: String = row.get(3)?;
    let trigger_value: String = row.get(4)?;

    Ok(Alarm {
        id: row.get(0)?,
        uid: row.get(1)?,
        action: str_to_action(&action),
        trigger: trigger_from_sql(&trigger_kind, &trigger_value, 4)?,
        description: row.get(5)?,
        acknowledged: optional_datetime_from_sql(row.get(6)?, 6)?,
    })
}

fn row_to_tombstone(row: &Row<'_>) -> rusqlite::Result<EventTombstone> {
    let event_id: i64 = row.get(0)?;
    let snapshot: String = row.get(1)?;
    let deleted_at: String = row.get(2)?;

    Ok(EventTombstone::restore(
        EventId::new(event_id),
        json_from_sql(&snapshot, 1)?,
        datetime_from_sql(&deleted_at, 2)?,
        row.get::<_, Option<i64>>(3)?.map(UserId::new),
    ))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
