//! Example: per-error retry strategies with a deadline
//!
//! This example demonstrates:
//! 1. Retrying a specific error with a fibonacci backoff
//! 2. Failing fast on an error nobody registered
//! 3. A catch-all strategy bounded by a total duration
//! 4. Cancelling a call from another task
//!
//! Run with:
//! ```bash
//! RUST_LOG=reattempt=debug cargo run -p reattempt --example retry_example
//! ```

use reattempt::prelude::*;
use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
enum ApiError {
    #[error("connection reset by peer")]
    ConnectionReset,
    #[error("rate limited")]
    RateLimited,
    #[error("unauthorized")]
    Unauthorized,
}

/// A simulated API that fails the first few times
struct UnreliableApi {
    attempts: AtomicU32,
    fail_count: u32,
    failure: ApiError,
}

impl UnreliableApi {
    fn new(fail_count: u32, failure: ApiError) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            fail_count,
            failure,
        }
    }

    async fn call(&self) -> Result<String, ApiError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        if attempt < self.fail_count {
            println!("  Attempt {}: FAILED ({})", attempt + 1, self.failure);
            Err(self.failure.clone())
        } else {
            println!("  Attempt {}: SUCCESS", attempt + 1);
            Ok("API response data".to_string())
        }
    }

    fn total_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Example 1: Retry one specific error
async fn example_retriable_error() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 1: Retry ConnectionReset with Fibonacci Backoff ===\n");

    let caller = Caller::new().with_retriable_error(
        ApiError::ConnectionReset,
        BackoffStrategy::new(fibonacci(), Duration::from_millis(50)).with_max_retries(5),
    );

    let api = UnreliableApi::new(3, ApiError::ConnectionReset);
    let start = Instant::now();

    let result = caller
        .call(&Context::background(), || api.call())
        .await?;

    println!("\nResult: {}", result);
    println!("Total attempts: {}", api.total_attempts());
    println!("Total time: {:?}", start.elapsed());
    println!("Expected delays: 50ms + 50ms + 100ms = ~200ms");

    Ok(())
}

/// Example 2: Unregistered errors are returned immediately
async fn example_non_retriable() {
    println!("\n=== Example 2: Non-retriable Error ===\n");

    let caller = Caller::new().with_retriable_error(
        ApiError::RateLimited,
        BackoffStrategy::new(constant(100), Duration::from_millis(1)),
    );

    let api = UnreliableApi::new(3, ApiError::Unauthorized);
    let err = caller
        .call(&Context::background(), || api.call())
        .await
        .unwrap_err();

    println!("\nError: {}", err);
    println!("Total attempts: {}", api.total_attempts());
    assert!(err.is_non_retriable());
}

/// Example 3: Retry anything, but never for longer than 500ms
async fn example_max_duration() {
    println!("\n=== Example 3: Catch-all Strategy with Max Duration ===\n");

    let caller = Caller::new()
        .with_retry_on_any_error(
            BackoffStrategy::new(exponential(2), Duration::from_millis(20))
                .with_jitter(Duration::from_millis(5))
                .with_capped_duration(Duration::from_millis(150)),
        )
        .with_max_duration(Duration::from_millis(500));

    let api = UnreliableApi::new(u32::MAX, ApiError::RateLimited);
    let start = Instant::now();
    let err = caller
        .call(&Context::background(), || api.call())
        .await
        .unwrap_err();

    println!("\nError: {}", err);
    println!("Last operation error: {:?}", err.last_error());
    println!("Total attempts: {}", api.total_attempts());
    println!("Total time: {:?} (bounded by 500ms)", start.elapsed());
    assert!(err.is_deadline_exceeded());
}

/// Example 4: Cancelling from the outside
async fn example_cancellation() {
    println!("\n=== Example 4: External Cancellation ===\n");

    let ctx = Context::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        println!("  Cancelling...");
        canceller.cancel();
    });

    let caller = Caller::new().with_retry_on_any_error(BackoffStrategy::new(
        constant(1),
        Duration::from_secs(60),
    ));

    let api = UnreliableApi::new(u32::MAX, ApiError::ConnectionReset);
    let start = Instant::now();
    let err = caller.call(&ctx, || api.call()).await.unwrap_err();

    println!("\nError: {}", err);
    println!("Total time: {:?} (the 60s wait was cut short)", start.elapsed());
    assert!(err.is_cancelled());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("reattempt examples");
    println!("==================");

    example_retriable_error().await?;
    example_non_retriable().await;
    example_max_duration().await;
    example_cancellation().await;

    println!("\n=== All examples completed ===\n");

    Ok(())
}
