use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Attempt budget and delay between failed attempts of one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total dispatch attempts per run, including the first.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff. Zero retries
    /// immediately.
    pub base_delay_ms: u64,
    /// Upper bound on any single backoff delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` and no delay between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            ..Self::default()
        }
    }

    /// Delay to wait after `failed_attempts` failures before the next try.
    ///
    /// Formula: min(base * 2^(failed_attempts - 1), max)
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        if failed_attempts == 0 || self.base_delay_ms == 0 {
            return Duration::ZERO;
        }

        let exp = failed_attempts.saturating_sub(1).min(32) as i32;
        let scaled = (self.base_delay_ms as f64) * 2f64.powi(exp);
        let capped = scaled.min(self.max_delay_ms as f64).max(0.0);

        Duration::from_millis(capped as u64)
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retries_immediately() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        for n in 0..5 {
            assert_eq!(policy.delay_after(n), Duration::ZERO);
        }
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        };
        assert_eq!(policy.delay_after(0), Duration::ZERO);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_after(u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn test_should_retry_respects_budget() {
        let policy = RetryPolicy::immediate(3);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }
}
