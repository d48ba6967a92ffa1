//! The retry executor: error classification plus the retry loop.

use super::strategy::BackoffStrategy;
use crate::context::{Context, DoneReason};
use crate::error::CallError;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

type Matcher = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;

#[derive(Clone)]
struct Classifier {
    label: &'static str,
    matches: Matcher,
    strategy: BackoffStrategy,
}

/// Calls a fallible async operation, retrying it according to the
/// strategies registered for the errors it returns.
///
/// Strategy selection on failure:
///
/// 1. the [any-error](Caller::with_retry_on_any_error) strategy, if set;
/// 2. otherwise the first registered classifier that accepts the error,
///    in registration order;
/// 3. otherwise the error is non-retriable and returned immediately.
///
/// Classifiers look through the returned error's [`source`](Error::source)
/// chain, so an error registered with
/// [`with_retriable_error`](Caller::with_retriable_error) also matches when
/// the operation returns it wrapped in another error. The reverse does not
/// hold: registering a wrapper does not make the bare inner error
/// retriable, so register the innermost error you want to retry.
///
/// # Examples
///
/// ```rust
/// use reattempt::prelude::*;
/// use std::time::Duration;
///
/// #[derive(Debug, PartialEq, thiserror::Error)]
/// enum FetchError {
///     #[error("connection reset")]
///     ConnectionReset,
///     #[error("not found")]
///     NotFound,
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let caller = Caller::new().with_retriable_error(
///     FetchError::ConnectionReset,
///     BackoffStrategy::new(constant(1), Duration::from_millis(1)).with_max_retries(3),
/// );
///
/// let result = caller
///     .call(&Context::background(), || async { Err::<(), _>(FetchError::NotFound) })
///     .await;
/// assert!(result.unwrap_err().is_non_retriable());
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Caller {
    classifiers: Vec<Classifier>,
    any_error: Option<BackoffStrategy>,
    max_duration: Option<Duration>,
}

impl Caller {
    /// Create a caller with no retriable errors: every error is returned
    /// after the first attempt until strategies are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry errors equal to `error` using `strategy`.
    ///
    /// A returned error matches when it, or any error in its source chain,
    /// has the same type as `error` and compares equal. Only the returned
    /// error's chain is walked; the chain of `error` itself is not. If
    /// `error` is already covered by an earlier registration the call is a
    /// no-op, since lookup stops at the first match anyway.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reattempt::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[derive(Debug, PartialEq, thiserror::Error)]
    /// enum FetchError {
    ///     #[error("connection reset")]
    ///     ConnectionReset,
    /// }
    ///
    /// let caller = Caller::new()
    ///     .with_retriable_error(
    ///         FetchError::ConnectionReset,
    ///         BackoffStrategy::new(fibonacci(), Duration::from_millis(100)).with_max_retries(5),
    ///     )
    ///     // Already registered: ignored.
    ///     .with_retriable_error(
    ///         FetchError::ConnectionReset,
    ///         BackoffStrategy::new(constant(1), Duration::from_secs(1)),
    ///     );
    ///
    /// assert!(format!("{caller:?}").contains("classifiers: [\"error\"]"));
    /// ```
    pub fn with_retriable_error<E>(mut self, error: E, strategy: BackoffStrategy) -> Self
    where
        E: Error + PartialEq + Send + Sync + 'static,
    {
        if self.classifiers.iter().any(|c| (c.matches)(&error)) {
            tracing::debug!(%error, "error already registered, ignoring");
            return self;
        }
        self.classifiers.push(Classifier {
            label: "error",
            matches: Arc::new(move |err: &(dyn Error + 'static)| {
                chain_contains(err, &error)
            }),
            strategy,
        });
        self
    }

    /// Retry every error of type `E` using `strategy`.
    pub fn with_retriable_type<E>(mut self, strategy: BackoffStrategy) -> Self
    where
        E: Error + 'static,
    {
        self.classifiers.push(Classifier {
            label: std::any::type_name::<E>(),
            matches: Arc::new(|err: &(dyn Error + 'static)| chain(err).any(|e| e.is::<E>())),
            strategy,
        });
        self
    }

    /// Retry every error accepted by `predicate` using `strategy`.
    ///
    /// The predicate sees the outermost error only; walk
    /// [`source`](Error::source) inside it if wrapped errors matter.
    pub fn with_retriable_when<P>(mut self, predicate: P, strategy: BackoffStrategy) -> Self
    where
        P: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.classifiers.push(Classifier {
            label: "predicate",
            matches: Arc::new(predicate),
            strategy,
        });
        self
    }

    /// Retry any error using `strategy`. Takes precedence over every
    /// error-specific registration.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reattempt::prelude::*;
    /// use std::time::Duration;
    ///
    /// let caller = Caller::new().with_retry_on_any_error(
    ///     BackoffStrategy::new(exponential(2), Duration::from_millis(50))
    ///         .with_jitter(Duration::from_millis(10))
    ///         .with_capped_duration(Duration::from_secs(2))
    ///         .with_max_retries(6),
    /// );
    /// # let _ = caller;
    /// ```
    pub fn with_retry_on_any_error(mut self, strategy: BackoffStrategy) -> Self {
        self.any_error = Some(strategy);
        self
    }

    /// Bound the total time a single [`call`](Caller::call) may spend.
    ///
    /// The bound narrows the scope passed to `call`; it never extends a
    /// deadline the scope already has.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reattempt::Caller;
    /// use std::time::Duration;
    ///
    /// let caller = Caller::new().with_max_duration(Duration::from_secs(30));
    /// assert_eq!(caller.max_duration(), Some(Duration::from_secs(30)));
    /// ```
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// The configured total-duration bound, if any.
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    /// Run `operation` until it succeeds or retrying has to stop.
    ///
    /// The scope `ctx` (narrowed by the max duration, if configured) is
    /// checked before every attempt, and the wait between attempts ends
    /// early when the scope is cancelled or expires. An attempt that has
    /// already succeeded is always returned, even if the scope finished
    /// while it ran.
    ///
    /// # Errors
    ///
    /// Returns a [`CallError`] carrying the last operation error and the
    /// reason retrying stopped.
    pub async fn call<F, Fut, T, E>(
        &self,
        ctx: &Context,
        mut operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let (scope, _release) = match self.max_duration {
            Some(max_duration) => {
                let scope = ctx.with_timeout(max_duration);
                let release = scope.token().clone().drop_guard();
                (scope, Some(release))
            }
            None => (ctx.clone(), None),
        };

        let mut attempts: u32 = 0;
        let mut last: Option<E> = None;
        loop {
            if let Some(reason) = scope.reason() {
                tracing::debug!(attempts, ?reason, "retry scope done, giving up");
                return Err(match reason {
                    DoneReason::Cancelled => CallError::Cancelled { attempts, last },
                    DoneReason::DeadlineExceeded => CallError::DeadlineExceeded { attempts, last },
                });
            }

            attempts = attempts.saturating_add(1);
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let Some((label, strategy)) = self.classify(&err) else {
                tracing::debug!(attempts, error = %err, "non-retriable error");
                return Err(CallError::NonRetriable {
                    attempts,
                    source: err,
                });
            };

            match strategy.delay() {
                Ok(delay) => {
                    tracing::debug!(
                        attempts,
                        matched = label,
                        ?delay,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    wait(&scope, delay).await;
                    last = Some(err);
                }
                Err(exhausted) => {
                    tracing::warn!(attempts, error = %err, %exhausted, "giving up");
                    return Err(CallError::Exhausted {
                        attempts,
                        source: err,
                    });
                }
            }
        }
    }

    fn classify(&self, err: &(dyn Error + 'static)) -> Option<(&'static str, &BackoffStrategy)> {
        if let Some(strategy) = &self.any_error {
            return Some(("any", strategy));
        }
        self.classifiers
            .iter()
            .find(|classifier| (classifier.matches)(err))
            .map(|classifier| (classifier.label, &classifier.strategy))
    }
}

impl fmt::Debug for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caller")
            .field(
                "classifiers",
                &self.classifiers.iter().map(|c| c.label).collect::<Vec<_>>(),
            )
            .field("any_error", &self.any_error)
            .field("max_duration", &self.max_duration)
            .finish()
    }
}

/// Sleep for `delay`, returning early if the scope finishes first.
async fn wait(scope: &Context, delay: Duration) {
    tokio::select! {
        biased;
        _ = scope.done() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

fn chain<'a>(err: &'a (dyn Error + 'static)) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

fn chain_contains<E>(err: &(dyn Error + 'static), target: &E) -> bool
where
    E: Error + PartialEq + 'static,
{
    chain(err).any(|e| e.downcast_ref::<E>().is_some_and(|e| e == target))
}
