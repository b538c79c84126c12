//! Bulk execution: ordered fail-fast or bounded concurrency.

use crate::{BatchError, BatchExecutor};
use futures::StreamExt;
use futures::stream;
use std::fmt::Display;
use std::future::{self, Future};
use std::pin::pin;
use std::sync::Arc;
use tessera_types::{BatchConfig, Categorize, ConfigError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress callback, invoked as `(completed, total)` after each operation settles.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Scheduling options for a batch.
#[derive(Clone)]
pub struct BatchRunOptions {
    concurrency: usize,
    cancel: Option<CancellationToken>,
    on_progress: Option<ProgressFn>,
}

impl std::fmt::Debug for BatchRunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunOptions")
            .field("concurrency", &self.concurrency)
            .field("cancel", &self.cancel)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl Default for BatchRunOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            cancel: None,
            on_progress: None,
        }
    }
}

impl BatchRunOptions {
    /// Creates sequential options with no cancellation and no progress callback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of operations allowed in flight at once.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the cancellation signal.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sets the progress callback.
    #[must_use]
    pub fn with_progress<P>(mut self, on_progress: P) -> Self
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(on_progress));
        self
    }

    /// Returns the configured concurrency.
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Checks that the concurrency is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroConcurrency`] for a concurrency of zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }

    /// Returns true if operations run one at a time, in order.
    #[must_use]
    pub const fn is_sequential(&self) -> bool {
        self.effective_concurrency() == 1
    }

    /// Zero is treated as sequential.
    const fn effective_concurrency(&self) -> usize {
        if self.concurrency == 0 { 1 } else { self.concurrency }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn report_progress(&self, completed: usize, total: usize) {
        if let Some(on_progress) = &self.on_progress {
            on_progress(completed, total);
        }
    }
}

/// A failed operation within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure<E> {
    /// Position of the operation in the input.
    pub index: usize,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// The last error.
    pub error: E,
}

/// Per-operation outcome of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport<T, E> {
    /// Successful results with their input index, sorted by index.
    pub succeeded: Vec<(usize, T)>,
    /// Failed operations, sorted by index.
    pub failed: Vec<BatchFailure<E>>,
    /// Whether cancellation stopped operations from starting.
    pub cancelled: bool,
    /// Number of operations submitted.
    pub total: usize,
}

impl<T, E> BatchReport<T, E> {
    fn empty(total: usize) -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
            total,
        }
    }

    /// Number of operations that settled.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Returns true if every operation ran and succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failed.is_empty() && self.succeeded.len() == self.total
    }

    /// Drops the indices and returns the successful values in input order.
    #[must_use]
    pub fn into_values(self) -> Vec<T> {
        self.succeeded.into_iter().map(|(_, value)| value).collect()
    }

    /// Applies the batch failure policy.
    ///
    /// Cancellation always fails. A sequential batch fails on its first
    /// failure. A concurrent batch fails only if nothing succeeded.
    ///
    /// # Errors
    ///
    /// See [`BatchExecutor::execute_all`].
    pub fn into_result(mut self, sequential: bool) -> Result<Vec<T>, BatchError<E>> {
        if self.cancelled {
            return Err(BatchError::Cancelled {
                completed: self.completed(),
                total: self.total,
            });
        }

        if sequential {
            if let Some(failure) = self.failed.pop() {
                return Err(BatchError::Failed {
                    attempts: failure.attempts,
                    source: failure.error,
                });
            }
        } else if self.succeeded.is_empty()
            && let Some(last) = self.failed.pop()
        {
            return Err(BatchError::AllFailed {
                count: self.failed.len() + 1,
                last: last.error,
            });
        }

        Ok(self.into_values())
    }

    fn record(&mut self, index: usize, outcome: Result<T, BatchError<E>>) {
        match outcome {
            Ok(value) => self.succeeded.push((index, value)),
            Err(BatchError::Failed { attempts, source }) => self.failed.push(BatchFailure {
                index,
                attempts,
                error: source,
            }),
            // `execute` only produces `Failed`.
            Err(BatchError::AllFailed { last, .. }) => self.failed.push(BatchFailure {
                index,
                attempts: 0,
                error: last,
            }),
            Err(BatchError::Cancelled { .. }) => self.cancelled = true,
        }
    }
}

impl BatchExecutor {
    /// Runs every operation and reports each outcome.
    ///
    /// With a concurrency of one, operations run strictly in input order and
    /// the first exhausted failure stops the batch. With a higher concurrency,
    /// up to that many run at once and every operation is attempted.
    ///
    /// The cancellation signal is checked before each operation starts; an
    /// operation already running is allowed to finish, retries included. The
    /// progress callback fires once per settled operation, with a strictly
    /// increasing count.
    pub async fn run_report<T, E, I, F, Fut>(&self, operations: I, options: &BatchRunOptions) -> BatchReport<T, E>
    where
        I: IntoIterator<Item = F>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Categorize + Display,
    {
        let operations: Vec<F> = operations.into_iter().collect();
        let total = operations.len();
        let mut report = BatchReport::empty(total);

        if options.is_cancelled() {
            report.cancelled = true;
            info!(total, "batch cancelled before start");
            return report;
        }

        let concurrency = options.effective_concurrency();
        if concurrency == 1 {
            for (index, operation) in operations.into_iter().enumerate() {
                if options.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                let outcome = self.execute(operation).await;
                let failed = outcome.is_err();
                report.record(index, outcome);
                options.report_progress(report.completed(), total);
                if failed {
                    break;
                }
            }
        } else {
            let cancel = options.cancel.clone();
            let mut outcomes = pin!(
                stream::iter(operations.into_iter().enumerate())
                    .take_while(move |_| {
                        future::ready(!cancel.as_ref().is_some_and(CancellationToken::is_cancelled))
                    })
                    .map(|(index, operation)| async move { (index, self.execute(operation).await) })
                    .buffer_unordered(concurrency)
            );

            while let Some((index, outcome)) = outcomes.next().await {
                report.record(index, outcome);
                options.report_progress(report.completed(), total);
            }

            // Every started operation settles, so a shortfall means cancellation.
            report.cancelled = report.completed() < total;
            report.succeeded.sort_unstable_by_key(|(index, _)| *index);
            report.failed.sort_unstable_by_key(|failure| failure.index);
        }

        if report.cancelled {
            info!(
                completed = report.completed(),
                total, "batch cancelled, remaining operations not started"
            );
        } else if report.failed.is_empty() {
            debug!(total, "batch finished");
        } else {
            warn!(
                failed = report.failed.len(),
                succeeded = report.succeeded.len(),
                total,
                "batch finished with failures"
            );
        }

        report
    }

    /// Runs every operation and collects the successful results.
    ///
    /// Sequential batches are strict: the first exhausted failure aborts the
    /// batch. Concurrent batches succeed if at least one operation succeeds,
    /// returning only the successful results in input order.
    ///
    /// # Errors
    ///
    /// - [`BatchError::Cancelled`] if the signal stopped any operation from starting
    /// - [`BatchError::Failed`] for the first failure of a sequential batch
    /// - [`BatchError::AllFailed`] if every operation of a concurrent batch failed
    pub async fn execute_all<T, E, I, F, Fut>(
        &self,
        operations: I,
        options: &BatchRunOptions,
    ) -> Result<Vec<T>, BatchError<E>>
    where
        I: IntoIterator<Item = F>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Categorize + Display,
    {
        self.run_report(operations, options)
            .await
            .into_result(options.is_sequential())
    }
}

/// Runs a batch with a fresh executor for `config`.
///
/// # Errors
///
/// See [`BatchExecutor::execute_all`].
pub async fn run_batch<T, E, I, F, Fut>(
    operations: I,
    config: BatchConfig,
    options: &BatchRunOptions,
) -> Result<Vec<T>, BatchError<E>>
where
    I: IntoIterator<Item = F>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Categorize + Display,
{
    BatchExecutor::new(config).execute_all(operations, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tessera_types::{ApiError, ErrorCategory};

    fn executor() -> BatchExecutor {
        BatchExecutor::new(BatchConfig {
            max_retries: 0,
            retry_delay_ms: 10,
            max_retry_delay_ms: 10,
        })
    }

    fn not_found(i: usize) -> ApiError {
        ApiError::http(404, "Not Found", None, format!("item {i} not found"))
    }

    #[tokio::test]
    async fn test_sequential_preserves_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let operations = (0..5).map(|i| {
            let seen = Arc::clone(&seen);
            move || {
                seen.lock().unwrap().push(i);
                future::ready(Ok::<_, ApiError>(i * 10))
            }
        });

        let results = executor()
            .execute_all(operations, &BatchRunOptions::new())
            .await
            .unwrap();

        assert_eq!(results, vec![0, 10, 20, 30, 40]);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_sequential_fails_fast() {
        let started = Arc::new(AtomicUsize::new(0));
        let operations = (0..3).map(|i| {
            let started = Arc::clone(&started);
            move || {
                started.fetch_add(1, Ordering::SeqCst);
                future::ready(if i == 1 { Err(not_found(i)) } else { Ok(i) })
            }
        });

        let err = executor()
            .execute_all(operations, &BatchRunOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::Failed { attempts: 1, .. }));
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_partial_success() {
        let operations = (0..3).map(|i| {
            move || async move {
                tokio::time::sleep(Duration::from_millis(10 * (3 - i as u64))).await;
                if i == 1 { Err(not_found(i)) } else { Ok(i) }
            }
        });

        let results = executor()
            .execute_all(operations, &BatchRunOptions::new().with_concurrency(3))
            .await
            .unwrap();

        assert_eq!(results, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_concurrent_total_failure() {
        let operations = (0..2).map(|i| move || future::ready(Err::<usize, _>(not_found(i))));

        let err = executor()
            .execute_all(operations, &BatchRunOptions::new().with_concurrency(2))
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::AllFailed { count: 2, .. }));
        assert!(err.to_string().starts_with("All 2 operations failed"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let started = Arc::new(AtomicUsize::new(0));
        let operations = (0..3).map(|i| {
            let started = Arc::clone(&started);
            move || {
                started.fetch_add(1, Ordering::SeqCst);
                future::ready(Ok::<_, ApiError>(i))
            }
        });

        for concurrency in [1, 3] {
            let options = BatchRunOptions::new()
                .with_concurrency(concurrency)
                .with_cancel(token.clone());
            let err = executor()
                .execute_all(operations.clone(), &options)
                .await
                .unwrap_err();
            assert_eq!(
                err,
                BatchError::Cancelled {
                    completed: 0,
                    total: 3
                }
            );
        }
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_scheduling() {
        let token = CancellationToken::new();
        let started = Arc::new(AtomicUsize::new(0));
        let operations = (0..4).map(|i| {
            let started = Arc::clone(&started);
            let token = token.clone();
            move || {
                started.fetch_add(1, Ordering::SeqCst);
                if i == 1 {
                    token.cancel();
                }
                future::ready(Ok::<_, ApiError>(i))
            }
        });

        let options = BatchRunOptions::new().with_cancel(token.clone());
        let report = executor().run_report(operations, &options).await;

        // The operation that raised the signal still completes.
        assert!(report.cancelled);
        assert_eq!(report.succeeded, vec![(0, 0), (1, 1)]);
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cancel_lets_in_flight_finish() {
        let token = CancellationToken::new();
        let operations = (0..6).map(|i| {
            let token = token.clone();
            move || {
                let token = token.clone();
                async move {
                    if i == 0 {
                        token.cancel();
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, ApiError>(i)
                }
            }
        });

        let options = BatchRunOptions::new()
            .with_concurrency(2)
            .with_cancel(token.clone());
        let err = executor().execute_all(operations, &options).await.unwrap_err();

        assert_eq!(
            err,
            BatchError::Cancelled {
                completed: 2,
                total: 6
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_monotonic() {
        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&progress);
        let options = BatchRunOptions::new()
            .with_concurrency(3)
            .with_progress(move |completed, total| sink.lock().unwrap().push((completed, total)));

        let operations = (0..4).map(|i| {
            move || async move {
                tokio::time::sleep(Duration::from_millis(5 * (4 - i as u64))).await;
                if i == 2 { Err(not_found(i)) } else { Ok(i) }
            }
        });
        let report = executor().run_report(operations, &options).await;

        assert_eq!(*progress.lock().unwrap(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
        assert_eq!(report.completed(), 4);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 2);
        assert!(!report.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let operations = (0..8).map(|i| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            move || {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ApiError>(i)
                }
            }
        });

        let results = executor()
            .execute_all(operations, &BatchRunOptions::new().with_concurrency(3))
            .await
            .unwrap();

        assert_eq!(results, (0..8).collect::<Vec<_>>());
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_retries_per_operation() {
        let executor = BatchExecutor::new(BatchConfig {
            max_retries: 2,
            retry_delay_ms: 100,
            max_retry_delay_ms: 1_000,
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let flaky = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            future::ready(if n == 0 {
                Err(ApiError::network("socket hang up"))
            } else {
                Ok(n)
            })
        };

        let results = executor
            .execute_all(vec![flaky], &BatchRunOptions::new().with_concurrency(4))
            .await
            .unwrap();

        assert_eq!(results, vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let operations: Vec<fn() -> future::Ready<Result<u8, ApiError>>> = Vec::new();
        let results = run_batch(operations, BatchConfig::default(), &BatchRunOptions::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_options_validation() {
        assert!(BatchRunOptions::new().validate().is_ok());
        assert_eq!(BatchRunOptions::new().concurrency(), 1);
        assert!(matches!(
            BatchRunOptions::new().with_concurrency(0).validate(),
            Err(ConfigError::ZeroConcurrency)
        ));
    }
}
