//! Event entity - A cached calendar event, series master or change exception

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Alarm, Attendee};
use crate::errors::DomainError;
use crate::value_objects::{EventId, FolderId, RecurrenceId, UserId};

/// Access classification of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    #[default]
    Public,
    Private,
    Confidential,
}

/// Whether an event blocks time in free/busy lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transparency {
    #[default]
    Opaque,
    Transparent,
}

/// Scheduling status of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Tentative,
    Confirmed,
    Cancelled,
}

/// Comparable fields of an event
///
/// Attendees and alarms are not listed; they are compared as collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventField {
    Id,
    Uid,
    SeriesId,
    RecurrenceId,
    FolderId,
    Summary,
    Description,
    Location,
    Start,
    End,
    AllDay,
    RecurrenceRule,
    ChangeExceptionDates,
    Classification,
    Transparency,
    Status,
    Organizer,
    Sequence,
    Created,
    CreatedBy,
    LastModified,
    ModifiedBy,
    CalendarUser,
    ExtendedProperties,
    Timestamp,
}

/// A calendar event as held by the cache
///
/// Constructed through [`EventBuilder`]; once built the value is only read.
/// External events carry no local `id` until the cache assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: Option<EventId>,
    uid: Option<String>,
    series_id: Option<EventId>,
    recurrence_id: Option<RecurrenceId>,
    folder_id: FolderId,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    all_day: bool,
    recurrence_rule: Option<String>,
    change_exception_dates: BTreeSet<RecurrenceId>,
    classification: Classification,
    transparency: Transparency,
    status: Option<EventStatus>,
    organizer: Option<String>,
    sequence: i32,
    attendees: Vec<Attendee>,
    alarms: Vec<Alarm>,
    created: Option<DateTime<Utc>>,
    created_by: Option<UserId>,
    last_modified: Option<DateTime<Utc>>,
    modified_by: Option<UserId>,
    calendar_user: Option<UserId>,
    extended_properties: BTreeMap<String, String>,
    timestamp: Option<i64>,
}

impl Event {
    /// Start building an event in `folder_id` spanning `[start, end)`
    #[must_use]
    pub fn builder(folder_id: FolderId, start: DateTime<Utc>, end: DateTime<Utc>) -> EventBuilder {
        EventBuilder::new(folder_id, start, end)
    }

    /// Continue building from a copy of this event
    #[must_use]
    pub fn to_builder(&self) -> EventBuilder {
        EventBuilder {
            event: self.clone(),
        }
    }

    pub const fn id(&self) -> Option<EventId> {
        self.id
    }

    /// Local id, failing for events the cache has not stored yet
    pub fn require_id(&self) -> Result<EventId, DomainError> {
        self.id
            .ok_or_else(|| DomainError::MissingEventId(self.display_key()))
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    /// The uid, if it is present and not blank
    pub fn resolvable_uid(&self) -> Option<&str> {
        self.uid().filter(|uid| !uid.trim().is_empty())
    }

    pub const fn series_id(&self) -> Option<EventId> {
        self.series_id
    }

    pub const fn recurrence_id(&self) -> Option<RecurrenceId> {
        self.recurrence_id
    }

    pub const fn folder_id(&self) -> &FolderId {
        &self.folder_id
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub const fn all_day(&self) -> bool {
        self.all_day
    }

    pub fn recurrence_rule(&self) -> Option<&str> {
        self.recurrence_rule.as_deref()
    }

    pub const fn change_exception_dates(&self) -> &BTreeSet<RecurrenceId> {
        &self.change_exception_dates
    }

    pub const fn classification(&self) -> Classification {
        self.classification
    }

    pub const fn transparency(&self) -> Transparency {
        self.transparency
    }

    pub const fn status(&self) -> Option<EventStatus> {
        self.status
    }

    pub fn organizer(&self) -> Option<&str> {
        self.organizer.as_deref()
    }

    pub const fn sequence(&self) -> i32 {
        self.sequence
    }

    pub fn attendees(&self) -> &[Attendee] {
        &self.attendees
    }

    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    pub const fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub const fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub const fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    pub const fn modified_by(&self) -> Option<UserId> {
        self.modified_by
    }

    pub const fn calendar_user(&self) -> Option<UserId> {
        self.calendar_user
    }

    pub const fn extended_properties(&self) -> &BTreeMap<String, String> {
        &self.extended_properties
    }

    pub const fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Check if this is a change exception (an occurrence stored on its own)
    pub const fn is_exception(&self) -> bool {
        self.recurrence_id.is_some()
    }

    /// Check if this is the master of a recurring series
    ///
    /// External events are masters when they carry a rule; stored events
    /// are masters when their series id points at themselves.
    pub fn is_series_master(&self) -> bool {
        if self.recurrence_id.is_some() {
            return false;
        }
        self.recurrence_rule.is_some() || (self.series_id.is_some() && self.series_id == self.id)
    }

    /// Fields whose values differ between `self` and `other`
    pub fn differing_fields(&self, other: &Self) -> BTreeSet<EventField> {
        let mut fields = BTreeSet::new();
        let mut check = |field: EventField, differs: bool| {
            if differs {
                fields.insert(field);
            }
        };
        check(EventField::Id, self.id != other.id);
        check(EventField::Uid, self.uid != other.uid);
        check(EventField::SeriesId, self.series_id != other.series_id);
        check(EventField::RecurrenceId, self.recurrence_id != other.recurrence_id);
        check(EventField::FolderId, self.folder_id != other.folder_id);
        check(EventField::Summary, self.summary != other.summary);
        check(EventField::Description, self.description != other.description);
        check(EventField::Location, self.location != other.location);
        check(EventField::Start, self.start != other.start);
        check(EventField::End, self.end != other.end);
        check(EventField::AllDay, self.all_day != other.all_day);
        check(EventField::RecurrenceRule, self.recurrence_rule != other.recurrence_rule);
        check(
            EventField::ChangeExceptionDates,
            self.change_exception_dates != other.change_exception_dates,
        );
        check(EventField::Classification, self.classification != other.classification);
        check(EventField::Transparency, self.transparency != other.transparency);
        check(EventField::Status, self.status != other.status);
        check(EventField::Organizer, self.organizer != other.organizer);
        check(EventField::Sequence, self.sequence != other.sequence);
        check(EventField::Created, self.created != other.created);
        check(EventField::CreatedBy, self.created_by != other.created_by);
        check(EventField::LastModified, self.last_modified != other.last_modified);
        check(EventField::ModifiedBy, self.modified_by != other.modified_by);
        check(EventField::CalendarUser, self.calendar_user != other.calendar_user);
        check(
            EventField::ExtendedProperties,
            self.extended_properties != other.extended_properties,
        );
        check(EventField::Timestamp, self.timestamp != other.timestamp);
        fields
    }

    /// Short human-readable key used in logs and errors
    pub fn display_key(&self) -> String {
        let uid = self.uid().unwrap_or("<no uid>");
        match self.recurrence_id {
            Some(rid) => format!("{uid}@{rid}"),
            None => uid.to_string(),
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} - {})",
            self.summary().unwrap_or("(untitled)"),
            self.start.to_rfc3339(),
            self.end.to_rfc3339()
        )
    }
}

/// Ordered construction of an [`Event`]
#[derive(Debug, Clone)]
#[must_use]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    fn new(folder_id: FolderId, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            event: Event {
                id: None,
                uid: None,
                series_id: None,
                recurrence_id: None,
                folder_id,
                summary: None,
                description: None,
                location: None,
                start,
                end,
                all_day: false,
                recurrence_rule: None,
                change_exception_dates: BTreeSet::new(),
                classification: Classification::default(),
                transparency: Transparency::default(),
                status: None,
                organizer: None,
                sequence: 0,
                attendees: Vec::new(),
                alarms: Vec::new(),
                created: None,
                created_by: None,
                last_modified: None,
                modified_by: None,
                calendar_user: None,
                extended_properties: BTreeMap::new(),
                timestamp: None,
            },
        }
    }

    pub const fn id(mut self, id: EventId) -> Self {
        self.event.id = Some(id);
        self
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.event.uid = Some(uid.into());
        self
    }

    pub fn maybe_uid(mut self, uid: Option<String>) -> Self {
        self.event.uid = uid;
        self
    }

    pub const fn series_id(mut self, series_id: Option<EventId>) -> Self {
        self.event.series_id = series_id;
        self
    }

    pub const fn recurrence_id(mut self, recurrence_id: Option<RecurrenceId>) -> Self {
        self.event.recurrence_id = recurrence_id;
        self
    }

    pub fn folder_id(mut self, folder_id: FolderId) -> Self {
        self.event.folder_id = folder_id;
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.event.summary = Some(summary.into());
        self
    }

    pub fn maybe_summary(mut self, summary: Option<String>) -> Self {
        self.event.summary = summary;
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.event.description = description;
        self
    }

    pub fn location(mut self, location: Option<String>) -> Self {
        self.event.location = location;
        self
    }

    pub const fn span(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.event.start = start;
        self.event.end = end;
        self
    }

    pub const fn all_day(mut self, all_day: bool) -> Self {
        self.event.all_day = all_day;
        self
    }

    pub fn recurrence_rule(mut self, rule: Option<String>) -> Self {
        self.event.recurrence_rule = rule;
        self
    }

    pub fn change_exception_dates(mut self, dates: BTreeSet<RecurrenceId>) -> Self {
        self.event.change_exception_dates = dates;
        self
    }

    pub const fn classification(mut self, classification: Classification) -> Self {
        self.event.classification = classification;
        self
    }

    pub const fn transparency(mut self, transparency: Transparency) -> Self {
        self.event.transparency = transparency;
        self
    }

    pub const fn status(mut self, status: Option<EventStatus>) -> Self {
        self.event.status = status;
        self
    }

    pub fn organizer(mut self, organizer: Option<String>) -> Self {
        self.event.organizer = organizer;
        self
    }

    pub const fn sequence(mut self, sequence: i32) -> Self {
        self.event.sequence = sequence;
        self
    }

    pub fn attendees(mut self, attendees: Vec<Attendee>) -> Self {
        self.event.attendees = attendees;
        self
    }

    pub fn attendee(mut self, attendee: Attendee) -> Self {
        self.event.attendees.push(attendee);
        self
    }

    pub fn alarms(mut self, alarms: Vec<Alarm>) -> Self {
        self.event.alarms = alarms;
        self
    }

    pub fn alarm(mut self, alarm: Alarm) -> Self {
        self.event.alarms.push(alarm);
        self
    }

    pub const fn created(mut self, at: Option<DateTime<Utc>>, by: Option<UserId>) -> Self {
        self.event.created = at;
        self.event.created_by = by;
        self
    }

    pub const fn modified(mut self, at: Option<DateTime<Utc>>, by: Option<UserId>) -> Self {
        self.event.last_modified = at;
        self.event.modified_by = by;
        self
    }

    pub const fn calendar_user(mut self, user: Option<UserId>) -> Self {
        self.event.calendar_user = user;
        self
    }

    pub fn extended_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.event
            .extended_properties
            .insert(name.into(), value.into());
        self
    }

    pub fn extended_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.event.extended_properties = properties;
        self
    }

    pub const fn timestamp(mut self, timestamp: Option<i64>) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    /// Strip everything the cache assigned locally (ids, series link,
    /// exception dates, alarm row ids) so the event can be stored anew
    pub fn detached(mut self) -> Self {
        self.event.id = None;
        self.event.series_id = None;
        self.event.change_exception_dates.clear();
        for alarm in &mut self.event.alarms {
            alarm.id = None;
        }
        self
    }

    /// Finish the event
    ///
    /// # Errors
    ///
    /// Returns a validation error if the event ends before it starts.
    pub fn build(self) -> Result<Event, DomainError> {
        if self.event.end < self.event.start {
            return Err(DomainError::ValidationError(format!(
                "event {} ends before it starts",
                self.event.display_key()
            )));
        }
        Ok(self.event)
    }
}
