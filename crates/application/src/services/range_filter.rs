//! Range filter
//!
//! Restricts events to the date window the caller asked for.

use domain::{DateRange, Event};

/// Keeps events overlapping a requested window
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeFilter {
    range: Option<DateRange>,
}

impl RangeFilter {
    /// Filter for `range`; `None` keeps everything
    #[must_use]
    pub const fn new(range: Option<DateRange>) -> Self {
        Self { range }
    }

    /// Check whether `event` falls into the window
    ///
    /// Series masters stay as long as they start before the window ends,
    /// since later occurrences may land inside it.
    #[must_use]
    pub fn accepts(&self, event: &Event) -> bool {
        let Some(range) = self.range else {
            return true;
        };
        if event.is_series_master() {
            return range.starts_before_end(event.start());
        }
        range.overlaps(event.start(), event.end())
    }

    /// Drop the events outside the window
    #[must_use]
    pub fn apply(&self, events: Vec<Event>) -> Vec<Event> {
        if self.range.is_none() {
            return events;
        }
        events.into_iter().filter(|e| self.accepts(e)).collect()
    }
}
