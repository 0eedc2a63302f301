//! Retry configuration for lock acquisition

use std::time::Duration;

use rand::Rng;
use rig_common::validation::validate_positive_duration;
use validator::Validate;

/// Default number of retries after the first attempt
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Default base interval between attempts
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(3);

/// Wait curve between acquisition attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// `retry_timeout * n` before retry `n` (n starting at 1)
    #[default]
    Linear,
    /// Uniformly random wait in `[0, retry_timeout * n]`.
    ///
    /// Spreads contenders that lost the same round so they do not hit the
    /// store in lockstep.
    LinearJitter,
}

impl Backoff {
    /// Wait before retry number `retry` (1-based).
    pub fn delay(&self, base: Duration, retry: u32) -> Duration {
        let linear = base.saturating_mul(retry);
        match self {
            Backoff::Linear => linear,
            Backoff::LinearJitter => {
                let ceiling = u64::try_from(linear.as_nanos()).unwrap_or(u64::MAX);
                Duration::from_nanos(rand::rng().random_range(0..=ceiling))
            }
        }
    }
}

impl std::str::FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "linear_jitter" | "jitter" => Ok(Self::LinearJitter),
            _ => Err(format!("Unknown backoff: {}", s)),
        }
    }
}

/// Retry policy for lock acquisition.
///
/// An acquisition makes at most `retry_count + 1` attempts. Only contention
/// is retried; store failures end the acquisition immediately.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct RetryPolicy {
    /// Retries after the first attempt (default 3)
    pub retry_count: u32,
    /// Base interval between attempts (default 3s)
    #[validate(custom(function = "validate_positive_duration"))]
    pub retry_timeout: Duration,
    /// Wait curve (default linear)
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            retry_timeout: DEFAULT_RETRY_TIMEOUT,
            backoff: Backoff::Linear,
        }
    }
}

impl RetryPolicy {
    /// Create a linear policy
    pub fn new(retry_count: u32, retry_timeout: Duration) -> Self {
        Self {
            retry_count,
            retry_timeout,
            backoff: Backoff::Linear,
        }
    }

    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self {
            retry_count: 0,
            ..Default::default()
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_retry_timeout(mut self, retry_timeout: Duration) -> Self {
        self.retry_timeout = retry_timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.delay(self.retry_timeout, attempt)
    }

    /// Sum of all waits of a fully contended acquisition under linear backoff.
    pub fn worst_case_wait(&self) -> Duration {
        (1..=self.retry_count).fold(Duration::ZERO, |acc, n| {
            acc.saturating_add(self.retry_timeout.saturating_mul(n))
        })
    }
}
