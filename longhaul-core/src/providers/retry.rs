//! Backoff policy for transient provider failures
//!
//! Provider clients never retry. The operation state machine consults this
//! policy after each transient failure to decide whether to try again and
//! when; the chosen delay is checkpointed as the operation's `not_before`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers::ClientError;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Maximum consecutive transient failures absorbed before giving up
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds)
    pub initial_delay_ms: u64,

    /// Ceiling for any single delay, provider hints included (milliseconds)
    pub max_delay_ms: u64,

    /// Base for exponential backoff (e.g., 2.0 for doubling)
    pub exponential_base: f64,

    /// Jitter factor (0.0 to 1.0) to randomize delays
    pub jitter_factor: f64,

    /// Whether to honour provider retry-after hints
    pub respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 500,
            max_delay_ms: 60_000,
            exponential_base: 2.0,
            jitter_factor: 0.1,
            respect_retry_after: true,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom attempt bound
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Patient policy for long video jobs on busy providers
    pub fn conservative() -> Self {
        Self {
            max_retries: 8,
            initial_delay_ms: 2_000,
            max_delay_ms: 300_000,
            exponential_base: 3.0,
            jitter_factor: 0.3,
            respect_retry_after: true,
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (zero-based), never above the ceiling
    pub fn calculate_delay(&self, attempt: u32, error: &ClientError) -> Duration {
        let ceiling = Duration::from_millis(self.max_delay_ms);

        if self.respect_retry_after {
            if let Some(retry_after) = error.retry_after() {
                return retry_after.min(ceiling);
            }
        }

        let exponent = attempt.min(i32::MAX as u32) as i32;
        let base_delay = self.initial_delay_ms as f64 * self.exponential_base.powi(exponent);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let delay_with_jitter = if self.jitter_factor > 0.0 {
            let mut rng = rand::thread_rng();
            let jitter_range = capped_delay * self.jitter_factor;
            let jitter = rng.gen_range(-jitter_range..=jitter_range);
            (capped_delay + jitter).clamp(0.0, self.max_delay_ms as f64)
        } else {
            capped_delay
        };

        Duration::from_millis(delay_with_jitter as u64)
    }

    /// Check if a failure after `attempt` prior failures may be retried
    pub fn should_retry(&self, error: &ClientError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.exponential_base < 1.0 {
            return Err("exponential_base must be at least 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err("jitter_factor must be between 0.0 and 1.0".to_string());
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err("max_delay_ms must not be less than initial_delay_ms".to_string());
        }
        Ok(())
    }
}
