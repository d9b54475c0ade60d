//! Domain layer for the calendar cache
//!
//! Contains the cached calendar model: events with their attendees and
//! alarms, tombstones of deleted events, typed account bookkeeping, and the
//! value objects identifying them. This layer has no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
