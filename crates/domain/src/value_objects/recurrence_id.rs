//! Recurrence identifier of an occurrence within a series

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

const ICS_UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Position of an occurrence within a recurring series
///
/// Ordered by the original start of the occurrence, so a `BTreeSet` of
/// recurrence ids is the sorted change-exception set of a series master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecurrenceId(DateTime<Utc>);

impl RecurrenceId {
    /// Create a recurrence id from the original start of the occurrence
    #[must_use]
    pub const fn new(original_start: DateTime<Utc>) -> Self {
        Self(original_start)
    }

    /// Original start of the occurrence
    #[must_use]
    pub const fn value(&self) -> DateTime<Utc> {
        self.0
    }

    /// Format as an iCalendar UTC date-time (`20250101T090000Z`)
    #[must_use]
    pub fn to_ics_string(&self) -> String {
        self.0.format(ICS_UTC_FORMAT).to_string()
    }

    /// Parse an iCalendar UTC date-time
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        NaiveDateTime::parse_from_str(s, ICS_UTC_FORMAT)
            .map(|naive| Self(naive.and_utc()))
            .map_err(|e| DomainError::InvalidDateTime(format!("{s}: {e}")))
    }
}

impl fmt::Display for RecurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ics_string())
    }
}

impl From<DateTime<Utc>> for RecurrenceId {
    fn from(original_start: DateTime<Utc>) -> Self {
        Self(original_start)
    }
}
