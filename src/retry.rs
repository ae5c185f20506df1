//! Bounded retry schedule with a fixed delay between attempts.
//!
//! The schedule never sleeps. Owners poll `is_due` from their own loop, which
//! keeps every pending retry cancellable by simply dropping the schedule.

use std::time::{Duration, Instant};

/// Maximum attempts and the pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Progress through a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    policy: RetryPolicy,
    attempts_made: u32,
    next_attempt_at: Instant,
}

impl RetrySchedule {
    /// First attempt is due immediately at `now`.
    pub fn new(policy: RetryPolicy, now: Instant) -> Self {
        Self {
            policy,
            attempts_made: 0,
            next_attempt_at: now,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        !self.exhausted() && now >= self.next_attempt_at
    }

    /// Counts an unsuccessful attempt and schedules the next one.
    pub fn record_failure(&mut self, now: Instant) {
        self.attempts_made = self.attempts_made.saturating_add(1);
        self.next_attempt_at = now + self.policy.delay;
    }

    pub fn exhausted(&self) -> bool {
        self.attempts_made >= self.policy.max_attempts
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::{RetryPolicy, RetrySchedule};
    use std::time::{Duration, Instant};

    #[test]
    fn test_first_attempt_is_due_immediately() {
        let now = Instant::now();
        let schedule = RetrySchedule::new(RetryPolicy::new(3, Duration::from_millis(200)), now);
        assert!(schedule.is_due(now));
        assert_eq!(schedule.attempts_made(), 0);
    }

    #[test]
    fn test_failures_wait_for_delay_then_exhaust() {
        let start = Instant::now();
        let mut schedule =
            RetrySchedule::new(RetryPolicy::new(3, Duration::from_millis(200)), start);

        schedule.record_failure(start);
        assert!(!schedule.is_due(start + Duration::from_millis(199)));
        assert!(schedule.is_due(start + Duration::from_millis(200)));

        let second = start + Duration::from_millis(200);
        schedule.record_failure(second);
        assert!(!schedule.exhausted());
        schedule.record_failure(second + Duration::from_millis(200));

        assert!(schedule.exhausted());
        assert_eq!(schedule.attempts_made(), 3);
        assert!(!schedule.is_due(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_zero_attempt_policy_still_tries_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
        let now = Instant::now();
        let mut schedule = RetrySchedule::new(policy, now);
        assert!(schedule.is_due(now));
        schedule.record_failure(now);
        assert!(schedule.exhausted());
    }
}
