//! Batch execution errors.

use tessera_types::{Categorize, ErrorCategory};
use thiserror::Error;

/// Failure of a single resilient operation or of a whole batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError<E> {
    /// The operation failed and will not be retried further.
    #[error("Operation failed after {attempts} attempt(s): {source}")]
    Failed {
        /// Total attempts made, including the first.
        attempts: u32,
        /// The last underlying error.
        source: E,
    },

    /// Every operation of a concurrent batch failed.
    #[error("All {count} operations failed; last error: {last}")]
    AllFailed {
        /// Number of failed operations.
        count: usize,
        /// The error of the last failed operation, in input order.
        last: E,
    },

    /// The cancellation signal stopped the batch before all operations started.
    #[error("Batch cancelled after {completed} of {total} operations")]
    Cancelled {
        /// Operations that settled before the batch stopped.
        completed: usize,
        /// Operations in the batch.
        total: usize,
    },
}

impl<E> BatchError<E> {
    /// Returns the number of attempts, for single-operation failures.
    #[must_use]
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::Failed { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Returns true if the batch stopped on cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns the underlying error, if any.
    #[must_use]
    pub const fn last_error(&self) -> Option<&E> {
        match self {
            Self::Failed { source, .. } => Some(source),
            Self::AllFailed { last, .. } => Some(last),
            Self::Cancelled { .. } => None,
        }
    }
}

impl<E: Categorize> Categorize for BatchError<E> {
    fn category(&self) -> ErrorCategory {
        self.last_error()
            .map_or(ErrorCategory::Abort, Categorize::category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::ApiError;

    #[test]
    fn test_display_names_attempts_and_cause() {
        let err = BatchError::Failed {
            attempts: 2,
            source: ApiError::network("connection reset"),
        };
        assert_eq!(
            err.to_string(),
            "Operation failed after 2 attempt(s): connection reset"
        );
        assert_eq!(err.attempts(), Some(2));
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_all_failed_and_cancelled() {
        let err: BatchError<ApiError> = BatchError::AllFailed {
            count: 2,
            last: ApiError::http(404, "Not Found", None, "Not Found"),
        };
        assert!(err.to_string().starts_with("All 2 operations failed"));
        assert_eq!(err.category(), ErrorCategory::NotFound);

        let err: BatchError<ApiError> = BatchError::Cancelled {
            completed: 1,
            total: 3,
        };
        assert!(err.is_cancelled());
        assert_eq!(err.category(), ErrorCategory::Abort);
        assert_eq!(err.last_error(), None);
    }
}
