//! Retry and health policies for the agent client.

use std::time::Duration;

/// Bounded exponential backoff for transient transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// Returns the total number of attempts allowed, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay to wait after the given failed attempt (1-based).
    ///
    /// The delay doubles with every attempt and is capped at the maximum.
    #[must_use]
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let factor = 1_u32
            .checked_shl(failed_attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100), Duration::from_secs(2))
    }
}

/// How many consecutive failures mark an agent DOWN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    failure_threshold: u32,
}

impl HealthPolicy {
    /// Creates a policy. The threshold is clamped to at least one.
    #[must_use]
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Returns the consecutive failure count that marks an agent DOWN.
    #[must_use]
    pub const fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Returns `true` when `streak` consecutive failures should mark the
    /// agent DOWN.
    #[must_use]
    pub const fn is_down(&self, streak: u32) -> bool {
        streak >= self.failure_threshold
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
