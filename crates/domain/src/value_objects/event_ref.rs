//! Fully qualified reference to a cached event

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EventId, FolderId, RecurrenceId};

/// Folder, local id and optional occurrence of a cached event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventRef {
    pub folder_id: FolderId,
    pub event_id: EventId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_id: Option<RecurrenceId>,
}

impl EventRef {
    /// Reference an event by folder and id
    #[must_use]
    pub fn new(folder_id: FolderId, event_id: EventId) -> Self {
        Self {
            folder_id,
            event_id,
            recurrence_id: None,
        }
    }

    /// Narrow the reference to a single occurrence
    #[must_use]
    pub const fn with_recurrence_id(mut self, recurrence_id: RecurrenceId) -> Self {
        self.recurrence_id = Some(recurrence_id);
        self
    }
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.recurrence_id {
            Some(rid) => write!(f, "{}/{}/{}", self.folder_id, self.event_id, rid),
            None => write!(f, "{}/{}", self.folder_id, self.event_id),
        }
    }
}
