//! Exponential backoff for connection-level failures.

use std::time::Duration;

/// Retry policy applied by the gateway to every outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

/// A scheduled retry. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    pub operation: &'static str,
    /// 1-indexed attempt about to be made.
    pub attempt: u32,
    pub next_delay: Duration,
}

impl RetryPolicy {
    /// Delay before `attempt` (1-indexed). The first attempt is immediate;
    /// attempt n >= 2 waits `initial_delay * 2^(n-2)`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    /// The retry following a failed `attempt`, if the budget allows one.
    pub fn after_failure(&self, operation: &'static str, attempt: u32) -> Option<RetryAttempt> {
        if attempt >= self.max_attempts {
            return None;
        }
        let next = attempt + 1;
        Some(RetryAttempt {
            operation,
            attempt: next,
            next_delay: self.delay_before(next),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_before(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_before(4), Duration::from_millis(4000));
    }

    #[test]
    fn budget_is_three_attempts() {
        let policy = RetryPolicy::default();
        let second = policy.after_failure("login", 1).unwrap();
        assert_eq!(second.attempt, 2);
        assert_eq!(second.next_delay, Duration::from_millis(1000));
        let third = policy.after_failure("login", 2).unwrap();
        assert_eq!(third.attempt, 3);
        assert_eq!(third.next_delay, Duration::from_millis(2000));
        assert!(policy.after_failure("login", 3).is_none());
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_before(200) >= Duration::from_secs(1000));
    }
}
