#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Retry-with-backoff execution for fallible async operations.
//!
//! This crate re-invokes an operation according to a configurable delay
//! schedule until it succeeds, a retry budget is exhausted, a total time
//! limit elapses, or the error is classified as non-retriable.
//!
//! - **Sequence generators** via the [`Generator`](retry::Generator) trait
//!   - constant, linear, exponential, fibonacci and random progressions
//! - **Delay shaping** via [`BackoffStrategy`](retry::BackoffStrategy)
//!   - time unit, jitter, cap and a shared retry counter
//! - **Per-error strategy selection** via [`Caller`](retry::Caller)
//!   - by error value, by error type, by predicate, or for any error
//! - **Cooperative cancellation** via [`Context`]
//!   - cancellation tokens with derivable deadlines
//! - **Declarative configuration** via the [`config`] module
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use reattempt::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let caller = Caller::new()
//!     .with_retry_on_any_error(
//!         BackoffStrategy::new(fibonacci(), Duration::from_millis(50))
//!             .with_jitter(Duration::from_millis(10))
//!             .with_max_retries(5),
//!     )
//!     .with_max_duration(Duration::from_secs(10));
//!
//! let value = caller
//!     .call(&Context::background(), || async {
//!         Ok::<_, std::io::Error>(42)
//!     })
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod retry;

pub use context::{Context, DoneReason};
pub use error::{CallError, ConfigError, StrategyError};
pub use retry::{BackoffStrategy, Caller};

/// Convenient re-exports of commonly used items.
///
/// Import all core abstractions with:
///
/// ```rust
/// use reattempt::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{CallerConfig, GeneratorConfig, StrategyConfig};
    pub use crate::context::{Context, DoneReason};
    pub use crate::error::{CallError, StrategyError};
    pub use crate::retry::{
        BackoffStrategy, Caller, Generator, constant, exponential, fibonacci, linear, random,
    };
}
