//! Retry strategies and the retry executor.
//!
//! Three pieces cooperate:
//!
//! - [`Generator`] - produces a raw numeric progression
//!   ([`constant`], [`linear`], [`exponential`], [`fibonacci`], [`random`])
//! - [`BackoffStrategy`] - scales the progression by a time unit, adds
//!   jitter, caps it and enforces a retry budget
//! - [`Caller`] - maps errors to strategies and drives the retry loop under
//!   a cancellable [`Context`](crate::Context)
//!
//! # Examples
//!
//! ```rust
//! use reattempt::Context;
//! use reattempt::retry::{BackoffStrategy, Caller, exponential};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let caller = Caller::new()
//!     .with_retry_on_any_error(
//!         BackoffStrategy::new(exponential(2), Duration::from_millis(100))
//!             .with_capped_duration(Duration::from_secs(5))
//!             .with_max_retries(6),
//!     )
//!     .with_max_duration(Duration::from_secs(30));
//!
//! let value = caller
//!     .call(&Context::background(), || async {
//!         // Your operation here
//!         Ok::<_, std::io::Error>(42)
//!     })
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

mod caller;
mod generator;
mod strategy;

pub use caller::Caller;
pub use generator::{
    Constant, Exponential, Fibonacci, Generator, Linear, Random, constant, exponential, fibonacci,
    linear, random,
};
pub use strategy::BackoffStrategy;
