//! Conversions between domain values and SQLite column values

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, SecondsFormat, Utc};
use domain::{
    AlarmAction, AlarmTrigger, CalendarUserType, Classification, EventStatus, ParticipantRole,
    ParticipationStatus, RecurrenceId, Transparency,
};
use rusqlite::types::Type;

/// Format an instant as fixed-width RFC 3339 text
pub fn datetime_to_sql(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a column written by [`datetime_to_sql`]
pub fn datetime_from_sql(value: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

pub fn optional_datetime_from_sql(
    value: Option<String>,
    column: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|s| datetime_from_sql(&s, column)).transpose()
}

pub fn recurrence_id_to_sql(recurrence_id: RecurrenceId) -> String {
    datetime_to_sql(recurrence_id.value())
}

pub fn exception_dates_to_sql(dates: &BTreeSet<RecurrenceId>) -> serde_json::Result<String> {
    serde_json::to_string(dates)
}

pub fn exception_dates_from_sql(
    value: &str,
    column: usize,
) -> rusqlite::Result<BTreeSet<RecurrenceId>> {
    json_from_sql(value, column)
}

pub fn properties_to_sql(properties: &BTreeMap<String, String>) -> serde_json::Result<String> {
    serde_json::to_string(properties)
}

pub fn properties_from_sql(value: &str, column: usize) -> rusqlite::Result<BTreeMap<String, String>> {
    json_from_sql(value, column)
}

/// Decode a JSON column, reporting failures as column conversion errors
pub fn json_from_sql<T: serde::de::DeserializeOwned>(
    value: &str,
    column: usize,
) -> rusqlite::Result<T> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

/// Convert a `Classification` to its database string representation
pub const fn classification_to_str(classification: Classification) -> &'static str {
    match classification {
        Classification::Public => "public",
        Classification::Private => "private",
        Classification::Confidential => "confidential",
    }
}

/// Convert a database string to a `Classification`
#[allow(clippy::match_same_arms)] // Fallback to Public is intentional
pub fn str_to_classification(s: &str) -> Classification {
    match s {
        "public" => Classification::Public,
        "private" => Classification::Private,
        "confidential" => Classification::Confidential,
        _ => Classification::Public,
    }
}

pub const fn transparency_to_str(transparency: Transparency) -> &'static str {
    match transparency {
        Transparency::Opaque => "opaque",
        Transparency::Transparent => "transparent",
    }
}

pub fn str_to_transparency(s: &str) -> Transparency {
    match s {
        "transparent" => Transparency::Transparent,
        _ => Transparency::Opaque,
    }
}

pub const fn status_to_str(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Tentative => "tentative",
        EventStatus::Confirmed => "confirmed",
        EventStatus::Cancelled => "cancelled",
    }
}

/// Unknown status strings read back as no status
pub fn str_to_status(s: &str) -> Option<EventStatus> {
    match s {
        "tentative" => Some(EventStatus::Tentative),
        "confirmed" => Some(EventStatus::Confirmed),
        "cancelled" => Some(EventStatus::Cancelled),
        _ => None,
    }
}

pub const fn cu_type_to_str(cu_type: CalendarUserType) -> &'static str {
    match cu_type {
        CalendarUserType::Individual => "individual",
        CalendarUserType::Group => "group",
        CalendarUserType::Resource => "resource",
        CalendarUserType::Room => "room",
        CalendarUserType::Unknown => "unknown",
    }
}

pub fn str_to_cu_type(s: &str) -> CalendarUserType {
    match s {
        "individual" => CalendarUserType::Individual,
        "group" => CalendarUserType::Group,
        "resource" => CalendarUserType::Resource,
        "room" => CalendarUserType::Room,
        _ => CalendarUserType::Unknown,
    }
}

pub const fn role_to_str(role: ParticipantRole) -> &'static str {
    match role {
        ParticipantRole::Chair => "chair",
        ParticipantRole::ReqParticipant => "req_participant",
        ParticipantRole::OptParticipant => "opt_participant",
        ParticipantRole::NonParticipant => "non_participant",
    }
}

#[allow(clippy::match_same_arms)] // Fallback to a required participant is intentional
pub fn str_to_role(s: &str) -> ParticipantRole {
    match s {
        "chair" => ParticipantRole::Chair,
        "req_participant" => ParticipantRole::ReqParticipant,
        "opt_participant" => ParticipantRole::OptParticipant,
        "non_participant" => ParticipantRole::NonParticipant,
        _ => ParticipantRole::ReqParticipant,
    }
}

pub const fn participation_to_str(status: ParticipationStatus) -> &'static str {
    match status {
        ParticipationStatus::NeedsAction => "needs_action",
        ParticipationStatus::Accepted => "accepted",
        ParticipationStatus::Declined => "declined",
        ParticipationStatus::Tentative => "tentative",
        ParticipationStatus::Delegated => "delegated",
    }
}

#[allow(clippy::match_same_arms)] // Fallback to NeedsAction is intentional
pub fn str_to_participation(s: &str) -> ParticipationStatus {
    match s {
        "needs_action" => ParticipationStatus::NeedsAction,
        "accepted" => ParticipationStatus::Accepted,
        "declined" => ParticipationStatus::Declined,
        "tentative" => ParticipationStatus::Tentative,
        "delegated" => ParticipationStatus::Delegated,
        _ => ParticipationStatus::NeedsAction,
    }
}

pub const fn action_to_str(action: AlarmAction) -> &'static str {
    match action {
        AlarmAction::Display => "display",
        AlarmAction::Audio => "audio",
        AlarmAction::Email => "email",
    }
}

#[allow(clippy::match_same_arms)] // Fallback to Display is intentional
pub fn str_to_action(s: &str) -> AlarmAction {
    match s {
        "display" => AlarmAction::Display,
        "audio" => AlarmAction::Audio,
        "email" => AlarmAction::Email,
        _ => AlarmAction::Display,
    }
}

/// Split a trigger into its `(kind, value)` columns
pub fn trigger_to_sql(trigger: AlarmTrigger) -> (&'static str, String) {
    match trigger {
        AlarmTrigger::Relative(seconds) => ("relative", seconds.to_string()),
        AlarmTrigger::Absolute(at) => ("absolute", datetime_to_sql(at)),
    }
}

pub fn trigger_from_sql(kind: &str, value: &str, column: usize) -> rusqlite::Result<AlarmTrigger> {
    if kind == "absolute" {
        return datetime_from_sql(value, column).map(AlarmTrigger::Absolute);
    }
    value
        .parse::<i64>()
        .map(AlarmTrigger::Relative)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
