//! Single-operation retry with capped exponential backoff.

use crate::BatchError;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tessera_types::{BatchConfig, Categorize, ErrorCategory};
use tracing::warn;

/// Decides from a failure's category whether another attempt is allowed.
pub type RetryPredicate = Arc<dyn Fn(ErrorCategory) -> bool + Send + Sync>;

/// Runs fallible async operations with retries.
///
/// The executor holds nothing but its configuration, so one instance can drive
/// any number of operations and batches at once.
#[derive(Clone)]
pub struct BatchExecutor {
    config: BatchConfig,
    retry_predicate: Option<RetryPredicate>,
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("config", &self.config)
            .field("custom_retry_predicate", &self.retry_predicate.is_some())
            .finish()
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

impl BatchExecutor {
    /// Creates an executor retrying by the default category policy.
    #[must_use]
    pub const fn new(config: BatchConfig) -> Self {
        Self {
            config,
            retry_predicate: None,
        }
    }

    /// Replaces the default category policy.
    ///
    /// Cancellation failures ([`ErrorCategory::Abort`]) are never retried,
    /// whatever the predicate says.
    #[must_use]
    pub fn with_retry_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(ErrorCategory) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Returns the retry configuration.
    #[must_use]
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Returns true if a failure of `category` may be retried.
    #[must_use]
    pub fn should_retry(&self, category: ErrorCategory) -> bool {
        if category == ErrorCategory::Abort {
            return false;
        }
        self.retry_predicate
            .as_ref()
            .map_or_else(|| category.is_retryable(), |predicate| predicate(category))
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_retries + 1` attempts have been made.
    ///
    /// Before attempt `n + 1` the executor sleeps for [`backoff_delay`]`(n)`.
    ///
    /// Only failures whose [`Categorize::category`] passes [`should_retry`]
    /// are retried. An error that classifies as [`ErrorCategory::Unknown`],
    /// such as a `String` whose message names no known failure, fails after a
    /// single attempt unless a retry predicate admits it.
    ///
    /// [`should_retry`]: Self::should_retry
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Failed`] with the attempt count and the last error.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, BatchError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Categorize + Display,
    {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let category = error.category();
            if attempt >= max_attempts || !self.should_retry(category) {
                return Err(BatchError::Failed {
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = backoff_delay(&self.config, attempt);
            warn!(
                attempt,
                max_attempts,
                %category,
                ?delay,
                error = %error,
                "operation failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Delay before the retry that follows failed attempt `attempt` (1-based):
/// `min(retry_delay_ms * 2^(attempt - 1), max_retry_delay_ms)`.
#[must_use]
pub fn backoff_delay(config: &BatchConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let delay_ms = config
        .retry_delay_ms
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(config.max_retry_delay_ms);
    Duration::from_millis(delay_ms)
}

/// Runs one operation with retries under `config`.
///
/// # Errors
///
/// See [`BatchExecutor::execute`].
pub async fn run_resilient<T, E, F, Fut>(operation: F, config: BatchConfig) -> Result<T, BatchError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Categorize + Display,
{
    BatchExecutor::new(config).execute(operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tessera_types::ApiError;
    use tokio::time::Instant;

    fn config(max_retries: u32) -> BatchConfig {
        BatchConfig {
            max_retries,
            retry_delay_ms: 100,
            max_retry_delay_ms: 1_000,
        }
    }

    /// Fails with `error` for the first `failures` calls, then returns the call number.
    fn flaky(
        failures: u32,
        error: ApiError,
    ) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<Result<u32, ApiError>>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let operation = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n <= failures {
                Err(error.clone())
            } else {
                Ok(n)
            })
        };
        (calls, operation)
    }

    #[test]
    fn test_backoff_delay_calculation() {
        let config = BatchConfig::default();
        assert_eq!(backoff_delay(&config, 1), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(&config, 2), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(&config, 3), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(&config, 5), Duration::from_millis(16_000));
        // 32s would exceed the cap
        assert_eq!(backoff_delay(&config, 6), Duration::from_millis(30_000));
        assert_eq!(backoff_delay(&config, 200), Duration::from_millis(30_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let executor = BatchExecutor::new(config(2));
        let (calls, operation) = flaky(2, ApiError::network("ECONNRESET"));

        let start = Instant::now();
        let value = executor.execute(operation).await.unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms then 200ms of backoff
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion() {
        let executor = BatchExecutor::new(config(1));
        let (calls, operation) = flaky(u32::MAX, ApiError::timeout(Duration::from_secs(30)));

        let err = executor.execute(operation).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err, BatchError::Failed { attempts: 2, .. }));
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }

    #[tokio::test]
    async fn test_zero_retries_means_one_attempt() {
        let executor = BatchExecutor::new(config(0));
        let (calls, operation) = flaky(u32::MAX, ApiError::network("connection refused"));

        let err = executor.execute(operation).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts(), Some(1));
    }

    #[tokio::test]
    async fn test_non_retryable_category_fails_fast() {
        let executor = BatchExecutor::new(config(5));
        let (calls, operation) = flaky(
            u32::MAX,
            ApiError::http(401, "Unauthorized", None, "Invalid API key"),
        );

        let err = executor.execute(operation).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.category(), ErrorCategory::Auth);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried() {
        let executor = BatchExecutor::new(config(3));
        let (calls, operation) = flaky(
            1,
            ApiError::http(429, "Too Many Requests", None, "Too Many Requests"),
        );

        assert_eq!(executor.execute(operation).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_only_errors_are_classified() {
        let executor = BatchExecutor::new(config(2));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result: Result<(), _> = executor
            .execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err("Request timeout".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        calls.store(0, Ordering::SeqCst);
        let counter = Arc::clone(&calls);
        let result: Result<(), _> = executor
            .execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err("something unexpected".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate_overrides_default() {
        let executor = BatchExecutor::new(config(2)).with_retry_predicate(|_| true);
        let (calls, operation) = flaky(u32::MAX, ApiError::http(404, "Not Found", None, "Not Found"));
        assert!(executor.execute(operation).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let executor = BatchExecutor::new(config(2)).with_retry_predicate(|_| false);
        let (calls, operation) = flaky(u32::MAX, ApiError::network("ECONNRESET"));
        assert!(executor.execute(operation).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_errors_retried_when_predicate_admits() {
        let executor = BatchExecutor::new(config(1))
            .with_retry_predicate(|category| category == ErrorCategory::Unknown);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let err = executor
            .execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err::<(), _>("something unexpected".to_string()))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.attempts(), Some(2));
    }

    #[tokio::test]
    async fn test_abort_is_never_retried() {
        let executor = BatchExecutor::new(config(5)).with_retry_predicate(|_| true);
        assert!(!executor.should_retry(ErrorCategory::Abort));

        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), _> = executor
            .execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err("operation aborted"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_resilient() {
        let (calls, operation) = flaky(1, ApiError::http(503, "Service Unavailable", None, "down"));
        let value = run_resilient(operation, config(1)).await.unwrap();
        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
