//! Reconnect budget and exponential backoff

use std::time::Duration;

/// Exponential backoff with a bounded number of consecutive attempts
///
/// Attempt `n` (1-based) waits `base_delay * 2^(n-1)`. The count resets on a
/// successful connect and on any manual connect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
    attempt_count: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 5)
    }
}

impl ReconnectPolicy {
    /// Policy allowing `max_attempts` retries starting at `base_delay`
    ///
    /// `max_attempts = 0` disables automatic reconnection.
    #[must_use]
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            attempt_count: 0,
        }
    }

    /// Delay before the first retry
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Retry budget
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Retries scheduled since the last reset
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether the budget is spent
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    /// Backoff for 1-based `attempt`, saturating instead of overflowing
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Claim the next attempt, returning its number and delay
    ///
    /// Returns `None` once the budget is spent.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt_count += 1;
        Some((self.attempt_count, self.delay_for_attempt(self.attempt_count)))
    }

    /// Restore the full budget
    pub fn reset(&mut self) {
        self.attempt_count = 0;
    }
}
