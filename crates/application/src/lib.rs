//! Application layer - Use cases and orchestration
//!
//! Contains the reconciliation engine that keeps the local calendar cache
//! consistent with the external source: range filtering, event diffing,
//! the create/update/delete caching handlers and the caching service facade,
//! plus the port definitions the infrastructure layer implements.

pub mod error;
pub mod ports;
pub mod services;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use error::ApplicationError;
pub use ports::*;
pub use services::*;
pub use session::CalendarSession;
