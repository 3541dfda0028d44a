//! Bounded exponential-backoff retry for async operations.
//!
//! Every failure is retried the same way until the attempt ceiling is hit;
//! the last failure is returned to the caller untouched.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Default number of attempts (initial call included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay; the wait before retry `n` is `base * 2^n`.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// How many times to attempt an operation and how long to wait in between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, initial call included. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Attempt ceiling, never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Backoff before retrying after zero-indexed `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Whether zero-indexed `attempt` is the last one allowed.
    pub fn is_last(&self, attempt: u32) -> bool {
        attempt + 1 >= self.attempts()
    }
}

/// Run `operation` until it succeeds or `policy.max_attempts` is reached.
///
/// Attempts are strictly sequential. Between attempts the calling task sleeps
/// for [`RetryPolicy::delay_for`]; no other task is blocked. After the final
/// failure the operation's own error is returned.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if policy.is_last(attempt) => return Err(e),
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
