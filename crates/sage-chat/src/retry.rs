//! Bounded automatic retry for a single logical send

use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Fixed wait before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(2),
        }
    }
}

/// Consecutive failures of the current send, bounded by the policy ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    count: u32,
    ceiling: u32,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            count: 0,
            ceiling: policy.max_retries,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether another automatic attempt is allowed
    pub fn can_retry(&self) -> bool {
        self.count < self.ceiling
    }

    /// Count a failure that will be retried; returns the retry number
    pub fn record_failure(&mut self) -> u32 {
        self.count = (self.count + 1).min(self.ceiling);
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_up_to_ceiling() {
        let mut state = RetryState::new(&RetryPolicy::default());
        assert!(state.can_retry());
        assert_eq!(state.record_failure(), 1);
        assert!(state.can_retry());
        assert_eq!(state.record_failure(), 2);
        assert!(!state.can_retry());
        assert_eq!(state.record_failure(), 2);
    }

    #[test]
    fn test_reset() {
        let mut state = RetryState::new(&RetryPolicy::default());
        state.record_failure();
        state.reset();
        assert_eq!(state.count(), 0);
        assert!(state.can_retry());
    }

    #[test]
    fn test_zero_ceiling_never_retries() {
        let policy = RetryPolicy {
            max_retries: 0,
            delay: Duration::ZERO,
        };
        assert!(!RetryState::new(&policy).can_retry());
    }
}
