//! Bounded retry state machine for HTTP fetches
//!
//! The fetcher feeds each attempt's outcome into a [`RetryState`], which
//! answers with either "retry after this delay" or "give up". No sleeping
//! happens here; the caller owns the clock.

use crate::config::FetchConfig;
use std::time::Duration;

/// Backoff parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per URL, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Random extra delay, as a fraction of the computed backoff
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based), without jitter
    ///
    /// `base * 2^(retry - 1)`, capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Backoff plus a uniform random extra in `[0, jitter * backoff]`
    pub fn backoff_with_jitter(&self, retry: u32) -> Duration {
        let delay = self.backoff(retry);
        if self.jitter <= 0.0 {
            return delay;
        }
        delay + delay.mul_f64(self.jitter * fastrand::f64())
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then try again
    Retry(Duration),
    /// Stop and report the last failure
    GiveUp,
}

/// Attempt counter and accumulated backoff for one URL
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
    total_backoff: Duration,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            total_backoff: Duration::ZERO,
        }
    }

    /// Records the start of an attempt and returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Decides what follows a failed attempt
    ///
    /// Permanent failures and an exhausted budget give up immediately, so no
    /// delay is ever scheduled after the final attempt. `retry_after` (from a
    /// 429 response) replaces the computed backoff, clamped to `max_delay`.
    pub fn on_failure(&mut self, transient: bool, retry_after: Option<Duration>) -> RetryDecision {
        if !transient || self.attempts >= self.policy.max_attempts {
            return RetryDecision::GiveUp;
        }

        let delay = match retry_after {
            Some(hint) => hint.min(self.policy.max_delay),
            None => self.policy.backoff_with_jitter(self.attempts),
        };
        self.total_backoff += delay;
        RetryDecision::Retry(delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Sum of all delays handed out so far
    pub fn total_backoff(&self) -> Duration {
        self.total_backoff
    }
}
