//! Error types for strategies, retry calls and configuration.

use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors reported by [`BackoffStrategy::delay`](crate::retry::BackoffStrategy::delay).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// The strategy's retry budget is spent. No further delays are issued
    /// for this strategy lineage.
    #[error("retry budget exhausted after {attempts} delay requests (max retries: {max_retries})")]
    Exhausted {
        /// Value of the shared call counter when the request was refused
        attempts: u64,
        /// Configured maximum
        max_retries: u32,
    },
}

/// Why a retry call stopped without a successful result.
///
/// Every variant carries the last error produced by the operation itself,
/// so the retry machinery never hides what actually went wrong. The
/// variant only records *why* retrying stopped.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// No registered strategy accepted the error.
    #[error("non-retriable error: {source}")]
    NonRetriable {
        /// Number of times the operation was invoked
        attempts: u32,
        /// The error nobody would retry
        #[source]
        source: E,
    },

    /// The selected strategy ran out of retries.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    Exhausted {
        /// Number of times the operation was invoked
        attempts: u32,
        /// Last error returned by the operation
        #[source]
        source: E,
    },

    /// The cancellation scope was cancelled by its owner.
    #[error("retrying cancelled after {attempts} attempts")]
    Cancelled {
        /// Number of times the operation was invoked
        attempts: u32,
        /// Last error returned by the operation, if it ran at all
        last: Option<E>,
    },

    /// The scope's deadline, or the caller's maximum duration, elapsed.
    #[error("retry deadline exceeded after {attempts} attempts")]
    DeadlineExceeded {
        /// Number of times the operation was invoked
        attempts: u32,
        /// Last error returned by the operation, if it ran at all
        last: Option<E>,
    },
}

impl<E> CallError<E> {
    /// Borrow the last error returned by the operation.
    ///
    /// `None` only when the scope was already done before the first attempt.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::NonRetriable { source: err, .. } | Self::Exhausted { source: err, .. } => {
                Some(err)
            }
            Self::Cancelled { last, .. } | Self::DeadlineExceeded { last, .. } => last.as_ref(),
        }
    }

    /// Take the last error returned by the operation.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::NonRetriable { source: err, .. } | Self::Exhausted { source: err, .. } => {
                Some(err)
            }
            Self::Cancelled { last, .. } | Self::DeadlineExceeded { last, .. } => last,
        }
    }

    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::NonRetriable { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Cancelled { attempts, .. }
            | Self::DeadlineExceeded { attempts, .. } => *attempts,
        }
    }

    /// Whether the error was classified as non-retriable.
    pub fn is_non_retriable(&self) -> bool {
        matches!(self, Self::NonRetriable { .. })
    }

    /// Whether the retry budget ran out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Whether the call was cancelled externally.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether the call ran out of time.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }
}

/// Errors that can occur when building values from declarative configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The strategy time unit must be positive
    #[error("strategy time unit must be greater than zero")]
    ZeroUnit,

    /// The random generator needs a positive exclusive upper bound
    #[error("random generator bound must be positive, got {0}")]
    InvalidRandomBound(i64),

    /// A zero maximum duration would stop every call before its first attempt
    #[error("caller max duration must be greater than zero")]
    ZeroMaxDuration,

    /// JSON parse error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn test_last_error_is_preserved_by_every_variant() {
        let exhausted: CallError<io::Error> = CallError::Exhausted {
            attempts: 3,
            source: io::Error::other("flaky"),
        };
        assert_eq!(exhausted.last_error().unwrap().to_string(), "flaky");
        assert_eq!(exhausted.attempts(), 3);
        assert!(exhausted.is_exhausted());

        let cancelled: CallError<io::Error> = CallError::Cancelled {
            attempts: 0,
            last: None,
        };
        assert!(cancelled.last_error().is_none());
        assert!(cancelled.is_cancelled());

        let deadline: CallError<io::Error> = CallError::DeadlineExceeded {
            attempts: 2,
            last: Some(io::Error::other("slow")),
        };
        assert_eq!(deadline.into_last_error().unwrap().to_string(), "slow");
    }

    #[test]
    fn test_source_chain_points_at_operation_error() {
        let err: CallError<io::Error> = CallError::NonRetriable {
            attempts: 1,
            source: io::Error::other("bad input"),
        };
        assert!(err.is_non_retriable());
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.to_string(), "non-retriable error: bad input");
        assert_eq!(err.source().unwrap().to_string(), "bad input");
    }

    #[test]
    fn test_strategy_error_display() {
        let err = StrategyError::Exhausted {
            attempts: 5,
            max_retries: 5,
        };
        assert_eq!(
            err.to_string(),
            "retry budget exhausted after 5 delay requests (max retries: 5)"
        );
    }
}
