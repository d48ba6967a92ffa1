//! Backoff strategies: generator values shaped into bounded, jittered delays.

use super::generator::Generator;
use crate::error::StrategyError;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Turns a [`Generator`] sequence into retry delays.
///
/// Each call to [`delay`](BackoffStrategy::delay) queries the generator
/// once, multiplies the value by the time unit, applies optional jitter and
/// clamps the result to `[0, cap]`.
///
/// # Shared state
///
/// The generator and the call counter live behind shared cells. The
/// builder methods and `Clone` keep pointing at the same cells, so every
/// strategy value derived from one [`BackoffStrategy::new`] observes and
/// advances a single retry budget. Reusing a strategy across calls (or
/// across tasks) therefore spends one budget; build a fresh strategy for
/// each independent retry session.
///
/// # Examples
///
/// ```rust
/// use reattempt::retry::{BackoffStrategy, linear};
/// use std::time::Duration;
///
/// let strategy = BackoffStrategy::new(linear(10), Duration::from_millis(1))
///     .with_capped_duration(Duration::from_millis(25))
///     .with_max_retries(4);
///
/// assert_eq!(strategy.delay().unwrap(), Duration::ZERO);
/// assert_eq!(strategy.delay().unwrap(), Duration::from_millis(10));
/// assert_eq!(strategy.delay().unwrap(), Duration::from_millis(20));
/// assert!(strategy.delay().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct BackoffStrategy {
    generator: Arc<Mutex<Box<dyn Generator>>>,
    unit: Duration,
    jitter: Duration,
    cap: Duration,
    max_retries: Option<u32>,
    calls: Arc<AtomicU64>,
}

impl BackoffStrategy {
    /// Create a strategy that multiplies every generator value by `unit`.
    ///
    /// Defaults: no jitter, no cap (`Duration::MAX`) and no retry limit.
    pub fn new<G>(generator: G, unit: Duration) -> Self
    where
        G: Generator + 'static,
    {
        Self::from_boxed(Box::new(generator), unit)
    }

    /// Create a strategy from an already boxed generator.
    pub fn from_boxed(generator: Box<dyn Generator>, unit: Duration) -> Self {
        Self {
            generator: Arc::new(Mutex::new(generator)),
            unit,
            jitter: Duration::ZERO,
            cap: Duration::MAX,
            max_retries: None,
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Add a uniformly random offset in `[-jitter, +jitter)` to every delay.
    ///
    /// Jittered delays are still clamped to `[0, cap]`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reattempt::retry::{BackoffStrategy, constant};
    /// use std::time::Duration;
    ///
    /// let strategy = BackoffStrategy::new(constant(100), Duration::from_millis(1))
    ///     .with_jitter(Duration::from_millis(20));
    ///
    /// let delay = strategy.delay().unwrap();
    /// assert!(delay >= Duration::from_millis(80) && delay < Duration::from_millis(120));
    /// ```
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Never return a delay longer than `cap`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reattempt::retry::{BackoffStrategy, exponential};
    /// use std::time::Duration;
    ///
    /// let strategy = BackoffStrategy::new(exponential(10), Duration::from_millis(1))
    ///     .with_capped_duration(Duration::from_millis(50));
    ///
    /// assert_eq!(strategy.delay().unwrap(), Duration::from_millis(1));
    /// assert_eq!(strategy.delay().unwrap(), Duration::from_millis(10));
    /// assert_eq!(strategy.delay().unwrap(), Duration::from_millis(50));
    /// ```
    pub fn with_capped_duration(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    /// Limit how many delays this strategy lineage hands out.
    ///
    /// The counter is compared after it is incremented, so a strategy with
    /// `max_retries = n` grants `n - 1` delays and refuses the `n`-th
    /// request. Paired with a [`Caller`](super::Caller) this means the
    /// operation runs at most `n` times in total.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reattempt::retry::{BackoffStrategy, constant};
    /// use reattempt::StrategyError;
    /// use std::time::Duration;
    ///
    /// let strategy = BackoffStrategy::new(constant(1), Duration::from_millis(1))
    ///     .with_max_retries(3);
    ///
    /// assert!(strategy.delay().is_ok());
    /// assert!(strategy.delay().is_ok());
    /// assert_eq!(
    ///     strategy.delay(),
    ///     Err(StrategyError::Exhausted { attempts: 3, max_retries: 3 })
    /// );
    /// ```
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Compute the next delay, or report that retries are exhausted.
    ///
    /// The shared counter is incremented before the budget check, and the
    /// generator is only advanced when a delay is actually granted.
    pub fn delay(&self) -> Result<Duration, StrategyError> {
        let attempts = self.calls.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if let Some(max_retries) = self.max_retries
            && attempts >= u64::from(max_retries)
        {
            return Err(StrategyError::Exhausted {
                attempts,
                max_retries,
            });
        }

        let step = self
            .generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next();

        let mut nanos = i128::from(step).saturating_mul(as_signed_nanos(self.unit));
        if !self.jitter.is_zero() {
            let jitter = as_signed_nanos(self.jitter);
            nanos = nanos.saturating_add(rand::thread_rng().gen_range(-jitter..jitter));
        }

        Ok(self.clamp(nanos))
    }

    fn clamp(&self, nanos: i128) -> Duration {
        if nanos <= 0 {
            return Duration::ZERO;
        }
        let nanos = nanos.unsigned_abs();
        if nanos >= self.cap.as_nanos() {
            return self.cap;
        }
        // Below the cap, so the seconds always fit in a u64.
        Duration::new((nanos / NANOS_PER_SEC) as u64, (nanos % NANOS_PER_SEC) as u32)
    }

    /// Number of delay requests made so far across the whole lineage.
    pub fn attempts(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Configured retry limit, if any.
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Time unit applied to generator values.
    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Jitter magnitude (zero when disabled).
    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Upper bound for returned delays.
    pub fn cap(&self) -> Duration {
        self.cap
    }
}

fn as_signed_nanos(duration: Duration) -> i128 {
    i128::try_from(duration.as_nanos()).unwrap_or(i128::MAX)
}
