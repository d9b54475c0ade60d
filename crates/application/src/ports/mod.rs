//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod account_config_store;
mod calendar_source_port;
mod calendar_storage;

pub use account_config_store::AccountConfigStore;
#[cfg(test)]
pub use calendar_source_port::MockExternalCalendarSource;
pub use calendar_source_port::{CalendarSourceError, ExternalCalendarSource};
pub use calendar_storage::{
    AlarmStorage, AttendeeStorage, CalendarStorage, CalendarStore, CalendarStoreExt,
    EventSearch, EventStorage, StorageError, StorageUtilities, StorageWork,
};
