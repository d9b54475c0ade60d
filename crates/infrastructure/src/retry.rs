//! Re-running cycles after transient storage conflicts
//!
//! A cycle that loses the SQLite write lock is rolled back as a whole and
//! reported as `ApplicationError::TransientStorageConflict`. Such a cycle can
//! simply run again from the fetch step; [`retry_conflicts`] does that with
//! doubling, jittered pauses in between. Any other error ends the loop.

use std::time::Duration;

use application::ApplicationError;
use rand::Rng;
use tracing::{debug, warn};

/// Backoff between re-runs of a conflicting cycle
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Pause before the first re-run in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound for a single pause in milliseconds
    pub max_delay_ms: u64,
    /// Re-runs after the first attempt
    pub max_retries: u32,
    /// Relative spread of each pause, `0.0` for none
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 50,
            max_delay_ms: 1_000,
            max_retries: 3,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Pause before re-run number `retry` (0-indexed): the initial delay
    /// doubled per re-run, capped, then spread by the jitter factor
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let doubled = self
            .initial_delay_ms
            .checked_shl(retry.min(63))
            .filter(|ms| ms >> retry.min(63) == self.initial_delay_ms)
            .unwrap_or(u64::MAX);
        let capped = doubled.min(self.max_delay_ms) as f64;
        if capped <= 0.0 || self.jitter_factor <= 0.0 {
            return Duration::from_millis(capped as u64);
        }
        let spread = capped * self.jitter_factor;
        let jittered = capped + rand::rng().random_range(-spread..=spread);
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Run `cycle`, re-running it while it fails with a retryable error and
/// re-runs remain. Returns the last result.
pub fn retry_conflicts<T, F>(config: &RetryConfig, mut cycle: F) -> Result<T, ApplicationError>
where
    F: FnMut() -> Result<T, ApplicationError>,
{
    let mut retries = 0;
    loop {
        match cycle() {
            Ok(value) => {
                if retries > 0 {
                    debug!(retries, "Cycle succeeded after conflicts");
                }
                return Ok(value);
            },
            Err(err) if err.is_retryable() && retries < config.max_retries => {
                let delay = config.delay_for_attempt(retries);
                retries += 1;
                warn!(
                    retry = retries,
                    max_retries = config.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Storage conflict, re-running cycle"
                );
                std::thread::sleep(delay);
            },
            Err(err) => {
                if err.is_retryable() {
                    warn!(retries, error = %err, "Giving up after storage conflicts");
                }
                return Err(err);
            },
        }
    }
}
