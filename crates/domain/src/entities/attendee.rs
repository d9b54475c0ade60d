//! Attendee entity - A participant of a cached event

use serde::{Deserialize, Serialize};

/// Kind of calendar user an attendee represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarUserType {
    #[default]
    Individual,
    Group,
    Resource,
    Room,
    Unknown,
}

/// Role of an attendee in the meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Chair,
    #[default]
    ReqParticipant,
    OptParticipant,
    NonParticipant,
}

/// Reply of an attendee to the invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    #[default]
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
}

/// Participant of an event, identified by its calendar-user URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Calendar-user address (`mailto:` URI)
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub cu_type: CalendarUserType,
    pub role: ParticipantRole,
    pub participation_status: ParticipationStatus,
    pub rsvp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Attendee {
    /// Create an individual, required attendee that has not replied yet
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            common_name: None,
            email: None,
            cu_type: CalendarUserType::default(),
            role: ParticipantRole::default(),
            participation_status: ParticipationStatus::default(),
            rsvp: false,
            comment: None,
        }
    }

    /// Set the display name
    #[must_use]
    pub fn with_common_name(mut self, name: impl Into<String>) -> Self {
        self.common_name = Some(name.into());
        self
    }

    /// Set the email address
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the participation status
    #[must_use]
    pub const fn with_status(mut self, status: ParticipationStatus) -> Self {
        self.participation_status = status;
        self
    }

    /// Set the role
    #[must_use]
    pub const fn with_role(mut self, role: ParticipantRole) -> Self {
        self.role = role;
        self
    }

    /// Identity used to match attendees across two versions of an event.
    /// URIs compare case-insensitively.
    #[must_use]
    pub fn identity(&self) -> String {
        self.uri.trim().to_lowercase()
    }
}
