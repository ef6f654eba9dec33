//! Retry with exponential backoff, shared by the scanner, fetcher and loader

use std::fmt::Display;
use std::time::Duration;

/// Backoff parameters for one class of I/O call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt)
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
    /// Upper bound for a single backoff sleep
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Retries without sleeping in between.
    pub const fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    /// Key-value source pagination: 5 retries, 1s, 2s, 4s, ...
    pub const fn source() -> Self {
        Self::new(5, Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Blob downloads: 5 retries starting at 1.5s
    pub const fn blob() -> Self {
        Self::new(5, Duration::from_millis(1500), Duration::from_secs(60))
    }

    /// Relational sink statements: 10 retries, capped at 5 minutes
    pub const fn sink() -> Self {
        Self::new(10, Duration::from_secs(2), Duration::from_secs(300))
    }

    /// Sleep before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::source()
    }
}

/// Run `attempt_fn` until it succeeds, fails with a non-retryable error, or
/// the policy's retry budget is spent.
///
/// `attempt_fn` receives the zero-based attempt number so callers can do
/// recovery work (reconnects) before a retry. Returns the last error on
/// exhaustion.
pub fn retry_with_backoff<T, E: Display>(
    label: &str,
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut attempt_fn: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if attempt < policy.max_retries && is_retryable(&e) => {
                attempt += 1;
                let delay = policy.backoff(attempt);
                log::warn!(
                    "{label}: attempt {attempt}/{} failed: {e}, retrying in {:.1}s",
                    policy.max_retries,
                    delay.as_secs_f64()
                );
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            Err(e) => {
                if attempt > 0 {
                    log::error!("{label}: failed permanently after {attempt} retries: {e}");
                } else {
                    log::debug!("{label}: failed: {e}");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn retryable(e: &TestError) -> bool {
        *e == TestError::Transient
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_secs(2), Duration::from_secs(300));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(9), Duration::from_secs(300));
        assert_eq!(policy.backoff(40), Duration::from_secs(300));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = retry_with_backoff("test", &RetryPolicy::immediate(3), retryable, |_| {
            calls += 1;
            if calls < 3 {
                Err(TestError::Transient)
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn stops_on_non_retryable() {
        let mut calls = 0;
        let result: Result<(), _> =
            retry_with_backoff("test", &RetryPolicy::immediate(5), retryable, |_| {
                calls += 1;
                Err(TestError::Fatal)
            });
        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls, 1);
    }

    #[test]
    fn exhausts_budget() {
        let mut attempts = Vec::new();
        let result: Result<(), _> =
            retry_with_backoff("test", &RetryPolicy::immediate(2), retryable, |attempt| {
                attempts.push(attempt);
                Err(TestError::Transient)
            });
        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(attempts, vec![0, 1, 2]);
    }

    #[test]
    fn zero_retries_is_single_attempt() {
        let mut calls = 0;
        let _: Result<(), _> =
            retry_with_backoff("test", &RetryPolicy::immediate(0), retryable, |_| {
                calls += 1;
                Err(TestError::Transient)
            });
        assert_eq!(calls, 1);
    }
}
