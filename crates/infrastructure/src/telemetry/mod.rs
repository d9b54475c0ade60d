//! Telemetry infrastructure
//!
//! Sets up `tracing` output as text or JSON lines.

mod logging;

pub use logging::{TelemetryError, init_logging};
