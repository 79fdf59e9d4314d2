//! Canonical retry policy for queued items.
//!
//! The engine uses exactly one backoff formula family for every retry site:
//! [`RetryPolicy`] with a configurable strategy (exponential with jitter by
//! default, linear available for callers that want fixed-increment waits).
//! Fatal errors are never retried, regardless of remaining attempts.

use std::future::Future;
use std::time::Duration;

use leadpilot_types::config::{BackoffStrategy, RetryConfig};

/// Classifies errors into retryable and fatal.
///
/// Implemented by the engine's error types; the retry wrapper consults it
/// before sleeping for another attempt.
pub trait Retryable {
    /// Whether another attempt could plausibly succeed.
    fn is_retryable(&self) -> bool;
}

/// Policy controlling retry attempts and backoff delays.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Base backoff duration.
    pub base_delay: Duration,
    /// Cap applied to every computed backoff.
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    /// Fixed jitter added to each backoff.
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Exponential,
            jitter: Duration::ZERO,
        }
    }

    /// Build a policy from the engine configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            strategy: config.strategy,
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Whether a further attempt is allowed after `attempt` (1-based) failed.
    pub fn should_retry<E: Retryable>(&self, error: &E, attempt: u32) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// Compute the backoff before the attempt following `attempt` (1-based).
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base = match self.strategy {
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
            BackoffStrategy::Exponential => {
                let exp = attempt.saturating_sub(1);
                let factor = if exp < 32 { 1_u32 << exp } else { u32::MAX };
                self.base_delay.saturating_mul(factor)
            }
        };
        let capped = base.min(self.max_delay);
        capped.saturating_add(self.jitter)
    }

    /// Run `op` under this policy, retrying retryable failures with backoff.
    ///
    /// `op` receives the 1-based attempt index. The final error is returned
    /// unchanged once attempts are exhausted or a fatal error is hit; the
    /// caller is responsible for recording a result for it rather than
    /// dropping the work.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if self.should_retry(&error, attempt) {
                        let backoff = self.backoff_duration(attempt);
                        tracing::debug!(
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %error,
                            "attempt failed, backing off before retry"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    } else {
                        tracing::warn!(
                            attempt,
                            error = %error,
                            "giving up after retry limit or fatal error"
                        );
                        return Err(error);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error")
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    #[test]
    fn linear_backoff() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100))
            .with_strategy(BackoffStrategy::Linear)
            .with_max_delay(Duration::from_millis(1000));
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(300));
        // capped at max_delay
        assert_eq!(policy.backoff_duration(20), Duration::from_millis(1000));
    }

    #[test]
    fn exponential_backoff() {
        let policy = RetryPolicy::new(5, Duration::from_millis(50))
            .with_max_delay(Duration::from_millis(400));
        // 1 -> 50ms, 2 -> 100ms, 3 -> 200ms, 4 -> 400ms, capped thereafter
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(50));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(200));
        assert_eq!(policy.backoff_duration(4), Duration::from_millis(400));
        assert_eq!(policy.backoff_duration(5), Duration::from_millis(400));
    }

    #[test]
    fn jitter_addition() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100))
            .with_strategy(BackoffStrategy::Linear)
            .with_jitter(Duration::from_millis(25));
        assert_eq!(
            policy.backoff_duration(2),
            Duration::from_millis(100 * 2 + 25)
        );
    }

    #[test]
    fn fatal_errors_are_never_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let fatal = TestError { retryable: false };
        let transient = TestError { retryable: true };
        assert!(!policy.should_retry(&fatal, 1));
        assert!(policy.should_retry(&transient, 1));
        // exhausted attempts
        assert!(!policy.should_retry(&transient, 5));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_k_failures_with_no_further_attempts() {
        // Retry law: fails exactly k < max times, then succeeds -- the wrapper
        // returns the success value and performs no extra attempts.
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<u32, TestError> = policy
            .run(|attempt| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if attempt <= 2 {
                        Err(TestError { retryable: true })
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_then_returns_last_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), TestError> = policy
            .run(|_| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError { retryable: true })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_error_short_circuits() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), TestError> = policy
            .run(|_| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError { retryable: false })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
