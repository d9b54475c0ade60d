//! Cache window and conflict retry configuration.

use chrono::{DateTime, Utc};
use domain::DateRange;
use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Calendar cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Days before "now" covered by the default date window (default: 30)
    #[serde(default = "default_window_past_days")]
    pub window_past_days: i64,

    /// Days after "now" covered by the default date window (default: 365)
    #[serde(default = "default_window_future_days")]
    pub window_future_days: i64,

    /// How often a cycle is re-run after a transient storage conflict
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// Backoff before the first re-run in milliseconds (default: 50ms)
    #[serde(default = "default_conflict_backoff_ms")]
    pub conflict_backoff_ms: u64,
}

const fn default_window_past_days() -> i64 {
    30
}

const fn default_window_future_days() -> i64 {
    365
}

const fn default_max_conflict_retries() -> u32 {
    3
}

const fn default_conflict_backoff_ms() -> u64 {
    50
}

impl CacheConfig {
    /// Default date window centered on `now`
    #[must_use]
    pub fn window(&self, now: DateTime<Utc>) -> DateRange {
        DateRange::around(now, self.window_past_days, self.window_future_days)
    }

    /// Retry policy for cycles rolled back by the database
    #[must_use]
    pub fn conflict_retry(&self) -> RetryConfig {
        RetryConfig {
            initial_delay_ms: self.conflict_backoff_ms,
            max_retries: self.max_conflict_retries,
            ..RetryConfig::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            window_past_days: default_window_past_days(),
            window_future_days: default_window_future_days(),
            max_conflict_retries: default_max_conflict_retries(),
            conflict_backoff_ms: default_conflict_backoff_ms(),
        }
    }
}
