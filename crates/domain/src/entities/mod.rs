//! Domain entities - Objects with identity and lifecycle

mod account;
mod alarm;
mod attendee;
mod event;
mod tombstone;

pub use account::{AccountCapabilities, AccountConfig, FolderCacheState};
pub use alarm::{Alarm, AlarmAction, AlarmTrigger};
pub use attendee::{Attendee, CalendarUserType, ParticipantRole, ParticipationStatus};
pub use event::{Classification, Event, EventBuilder, EventField, EventStatus, Transparency};
pub use tombstone::EventTombstone;
