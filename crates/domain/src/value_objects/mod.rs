//! Value Objects - Immutable, identity-less domain primitives

mod account_id;
mod date_range;
mod event_id;
mod event_ref;
mod folder_id;
mod recurrence_id;
mod user_id;

pub use account_id::AccountId;
pub use date_range::DateRange;
pub use event_id::EventId;
pub use event_ref::EventRef;
pub use folder_id::FolderId;
pub use recurrence_id::RecurrenceId;
pub use user_id::UserId;
