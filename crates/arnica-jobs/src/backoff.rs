//! Bounded retry with jittered exponential backoff.

use std::time::Duration;

use rand::Rng;

/// How transient failures of one exchange are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry, before jitter.
    pub base_delay: Duration,
    /// Upper bound of the delay, before jitter.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Delay before retry number `attempt`, scaled by a factor in `[0.5, 1.0]`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let jitter: f64 = rand::thread_rng().gen_range(0.5..=1.0);
        self.delay_for(attempt).mul_f64(jitter)
    }
}

/// Consecutive-failure state of one call. Never shared between calls.
#[derive(Debug)]
pub(crate) struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Record a failure; returns the delay before the next attempt, or `None`
    /// once the budget is spent.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        let attempt = self.failures;
        self.failures += 1;
        (attempt < self.policy.max_retries).then(|| self.policy.jittered_delay(attempt))
    }

    /// Failed exchanges since the last success.
    pub(crate) fn failures(&self) -> u32 {
        self.failures
    }

    pub(crate) fn reset(&mut self) {
        self.failures = 0;
    }
}
