//! Tracing subscriber initialization

use thiserror::Error;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

/// Logging setup errors
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber is already installed, or the filter is invalid
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured filter.
///
/// # Example
///
/// ```ignore
/// use infrastructure::{AppConfig, telemetry::init_logging};
///
/// let config = AppConfig::load()?;
/// init_logging(&config.logging)?;
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| TelemetryError::Init(format!("invalid log filter: {e}")))?,
    };

    match config.format {
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| TelemetryError::Init(e.to_string()))?;
        },
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_target(true)
                .with_thread_ids(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| TelemetryError::Init(e.to_string()))?;
        },
    }

    info!(format = ?config.format, "Logging initialized");
    Ok(())
}
