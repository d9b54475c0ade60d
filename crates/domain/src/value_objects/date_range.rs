//! Requested date window for cache queries

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open date window `[from, until)`.
/// `None` means unbounded in that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Window with both bounds set
    #[must_use]
    pub const fn new(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            until: Some(until),
        }
    }

    /// Window that excludes nothing
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            from: None,
            until: None,
        }
    }

    /// Window of `past_days` before and `future_days` after `now`.
    /// A bound outside the representable date range is left open.
    #[must_use]
    pub fn around(now: DateTime<Utc>, past_days: i64, future_days: i64) -> Self {
        Self {
            from: Duration::try_days(past_days).and_then(|d| now.checked_sub_signed(d)),
            until: Duration::try_days(future_days).and_then(|d| now.checked_add_signed(d)),
        }
    }

    /// Check whether the span `[start, end)` intersects this window.
    /// A zero-length span counts as the instant `start`.
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let end = end.max(start);
        let after_from = self
            .from
            .is_none_or(|from| end > from || (end == start && start >= from));
        let before_until = self.until.is_none_or(|until| start < until);
        after_from && before_until
    }

    /// Check whether something starting at `start` begins before the window ends
    #[must_use]
    pub fn starts_before_end(&self, start: DateTime<Utc>) -> bool {
        self.until.is_none_or(|until| start < until)
    }
}
