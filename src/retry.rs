//! Exponential backoff with jitter.
//!
//! Both the media fetcher and the post renderer retry through the same
//! [`RetryPolicy`]. Each retrying operation owns a [`RetryState`] that counts
//! attempts and decides whether another one is allowed.
//!
//! # Backoff Strategy
//!
//! ```text
//! wait(n) = base_wait * 2^(n-1) + uniform_jitter(0..max_jitter)
//! ```
//!
//! With the defaults (5 attempts, 5 s base, 2 s jitter) the waits after the
//! first four failures are roughly 5 s, 10 s, 20 s and 40 s. No wait follows
//! the final failure.

use rand::{Rng, rng};
use std::time::Duration;

/// Bounded retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Wait after the first failure; doubles on every further failure.
    pub base_wait: Duration,
    /// Exclusive upper bound of the random jitter added to every wait.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_wait: Duration::from_secs(5),
            max_jitter: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without sleeping. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_wait: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Deterministic part of the wait after failed attempt `attempt` (1-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_wait.saturating_mul(1u32 << exponent)
    }

    /// Full wait after failed attempt `attempt`: base delay plus fresh jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let nanos = self.max_jitter.as_nanos().min(u64::MAX as u128) as u64;
        Duration::from_nanos(rng().random_range(0..nanos))
    }

    pub fn start(&self) -> RetryState {
        RetryState {
            policy: *self,
            attempt: 0,
        }
    }
}

/// Attempt bookkeeping for a single retrying operation.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    /// Number of attempts that have failed so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.policy.max_attempts
    }

    /// Record a failed attempt.
    ///
    /// Returns the wait before the next attempt, or `None` once the attempt
    /// ceiling has been reached.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.exhausted() {
            None
        } else {
            Some(self.policy.delay_for(self.attempt))
        }
    }
}
