//! Retry policy for queued jobs.
//!
//! Delay grows as `base * 2^(attempt - 1)` and is capped at `max_delay`.
//! `attempt` counts attempts already made, so the first retry waits `base`.

use std::time::Duration;

/// Longest delay between two attempts of the same job.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(600);

/// Exponential backoff with a fixed attempt ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: MAX_RETRY_DELAY,
        }
    }

    /// Webhook processing: 5 attempts, 2s base.
    pub const fn webhook() -> Self {
        Self::exponential(crate::queue::WEBHOOK_MAX_ATTEMPTS, Duration::from_secs(2))
    }

    /// Catalog import: 3 attempts, 5s base.
    pub const fn catalog_import() -> Self {
        Self::exponential(crate::queue::CATALOG_IMPORT_MAX_ATTEMPTS, Duration::from_secs(5))
    }

    /// Delay before the next attempt, or `None` once `attempts_made` has
    /// reached the ceiling.
    pub fn delay_after(&self, attempts_made: u32) -> Option<Duration> {
        if attempts_made == 0 || attempts_made >= self.max_attempts {
            return None;
        }
        let multiplier = 2_u32.saturating_pow(attempts_made - 1);
        Some(self.base_delay.saturating_mul(multiplier).min(self.max_delay))
    }

    pub fn should_retry(&self, attempts_made: u32) -> bool {
        self.delay_after(attempts_made).is_some()
    }
}
