//! Exponential backoff for rate-limited launch attempts.

use std::time::Duration;

/// Per-domain retry policy: `delay = base_delay * 2^attempt_index`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BackoffPolicy {
    /// Delay applied after the first throttled attempt.
    pub base_delay: Duration,
    /// Attempts made against one domain before moving on.
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay after the attempt at zero-based `attempt_index`. Saturates
    /// instead of overflowing for very large indices.
    #[must_use]
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt_index).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Starts a fresh retry sequence for one domain.
    #[must_use]
    pub const fn start(&self) -> BackoffState {
        BackoffState {
            policy: *self,
            attempt_index: 0,
        }
    }
}

/// Retry progress against a single domain. Dropped once the domain is left.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BackoffState {
    policy: BackoffPolicy,
    attempt_index: u32,
}

impl BackoffState {
    /// Zero-based index of the attempt about to be made.
    #[must_use]
    pub const fn attempt_index(&self) -> u32 {
        self.attempt_index
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn has_attempts_left(&self) -> bool {
        self.attempt_index < self.policy.max_attempts
    }

    /// Records a throttled attempt and returns the delay to apply before
    /// the next one.
    pub fn record_throttled(&mut self) -> Duration {
        let delay = self.policy.delay_for(self.attempt_index);
        self.attempt_index = self.attempt_index.saturating_add(1);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn delays_double_from_the_base() {
        let policy = BackoffPolicy::new(Duration::from_secs(15), 5);
        let delays: Vec<u64> = (0..5).map(|index| policy.delay_for(index).as_secs()).collect();
        assert_eq!(delays, vec![15, 30, 60, 120, 240]);
    }

    #[rstest]
    fn state_stops_after_max_attempts() {
        let mut state = BackoffPolicy::new(Duration::from_secs(1), 3).start();
        let mut waits = Vec::new();
        while state.has_attempts_left() {
            waits.push(state.record_throttled().as_secs());
        }
        assert_eq!(waits, vec![1, 2, 4]);
        assert_eq!(state.attempt_index(), 3);
    }

    #[rstest]
    fn huge_indices_saturate() {
        let policy = BackoffPolicy::new(Duration::from_secs(15), 5);
        assert_eq!(policy.delay_for(200), Duration::from_secs(15).saturating_mul(u32::MAX));
    }

    #[rstest]
    fn zero_attempts_never_retry() {
        let state = BackoffPolicy::new(Duration::from_secs(15), 0).start();
        assert!(!state.has_attempts_left());
    }
}
