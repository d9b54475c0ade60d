//! Alarm entity - A reminder attached to a cached event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an alarm does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmAction {
    #[default]
    Display,
    Audio,
    Email,
}

/// When an alarm fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum AlarmTrigger {
    /// Offset in seconds from the event start (negative = before)
    Relative(i64),
    /// Fixed point in time
    Absolute(DateTime<Utc>),
}

/// Alarm of an event, identified by its uid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    /// Storage id, assigned when the alarm row is inserted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Alarm identity, stable across refreshes
    pub uid: String,
    pub action: AlarmAction,
    pub trigger: AlarmTrigger,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged: Option<DateTime<Utc>>,
}

impl Alarm {
    /// Create a display alarm
    #[must_use]
    pub fn new(uid: impl Into<String>, trigger: AlarmTrigger) -> Self {
        Self {
            id: None,
            uid: uid.into(),
            action: AlarmAction::default(),
            trigger,
            description: None,
            acknowledged: None,
        }
    }

    /// Set the alarm text
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the action
    #[must_use]
    pub const fn with_action(mut self, action: AlarmAction) -> Self {
        self.action = action;
        self
    }

    /// Compare everything except the storage id
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.action == other.action
            && self.trigger == other.trigger
            && self.description == other.description
            && self.acknowledged == other.acknowledged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_ignores_storage_id() {
        let stored = Alarm {
            id: Some(3),
            ..Alarm::new("alarm-1", AlarmTrigger::Relative(-900))
        };
        let fetched = Alarm::new("alarm-1", AlarmTrigger::Relative(-900));
        assert!(stored.same_content(&fetched));
        assert_ne!(stored, fetched);
    }

    #[test]
    fn different_trigger_is_different_content() {
        let a = Alarm::new("alarm-1", AlarmTrigger::Relative(-900));
        let b = Alarm::new("alarm-1", AlarmTrigger::Relative(-600));
        assert!(!a.same_content(&b));
    }
}
