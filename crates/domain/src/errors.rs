//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// An event reached a step that requires a local id before one was assigned
    #[error("Event has no local id: {0}")]
    MissingEventId(String),

    /// Date/time parsing error
    #[error("Invalid date/time: {0}")]
    InvalidDateTime(String),
}
