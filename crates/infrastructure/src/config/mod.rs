//! Application configuration
//!
//! Split into focused sub-modules:
//! - `database`: SQLite database settings
//! - `cache`: Default date window and conflict retries
//! - `logging`: Log filter and output format

mod cache;
mod database;
mod logging;

use serde::{Deserialize, Serialize};

pub use cache::CacheConfig;
pub use database::DatabaseConfig;
pub use logging::{LogFormat, LoggingConfig};

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment and optional file
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from the file `name` (any extension the `config`
    /// crate understands, optional) overlaid with `CALCACHE_*` variables
    pub fn load_from(name: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // Start with defaults
            .set_default("database.path", "calcache.db")?
            .set_default("logging.format", "text")?
            // Load from file if exists
            .add_source(config::File::with_name(name).required(false))
            // Override with environment variables (e.g., CALCACHE_DATABASE__PATH)
            .add_source(
                config::Environment::with_prefix("CALCACHE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
