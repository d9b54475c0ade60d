//! External calendar source port
//!
//! Defines how the cache reads the read-only external calendar it mirrors.
//! Implemented by provider adapters (iCal feeds, CalDAV, ...).

use domain::{Event, EventRef, FolderId};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

/// External source errors
#[derive(Debug, Error)]
pub enum CalendarSourceError {
    #[error("Calendar service unavailable")]
    ServiceUnavailable,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Read access to the external calendar
///
/// Every call returns a complete, non-paginated snapshot. Returned events
/// carry no local ids; series masters precede nothing in particular, the
/// cache groups them itself.
#[cfg_attr(test, automock)]
pub trait ExternalCalendarSource: Send + Sync {
    /// All events of a folder
    fn events_in_folder(&self, folder_id: &FolderId) -> Result<Vec<Event>, CalendarSourceError>;

    /// The events behind a set of references
    ///
    /// Not used by the caching cycles, which always reconcile whole folders
    /// so that removals are seen. Part of the port for adapters and callers
    /// that read single events straight from the source.
    fn events(&self, refs: &[EventRef]) -> Result<Vec<Event>, CalendarSourceError>;
}
