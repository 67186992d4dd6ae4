//! Retry logic with exponential backoff
//!
//! Per-item uploads may be retried on transient failures. Retries happen while
//! the item is still `processing`; an item that reached `error` is never retried.
//!
//! # Example
//!
//! ```no_run
//! use doc_intake::retry::{IsRetryable, retry_with_backoff};
//! use doc_intake::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! retry_with_backoff(
//!     &config,
//!     || async { Ok::<_, MyError>(()) },
//!     |attempt, e| eprintln!("attempt {attempt} failed: {e}"),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::ItemError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, 5xx) should return `true`.
/// Permanent failures (rejected payload, undecodable body) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ItemError {
    fn is_retryable(&self) -> bool {
        match self {
            ItemError::Transport { transient, .. } => *transient,
            ItemError::Timeout(_) => true,
            // The service understood the request; sending it again will not help
            ItemError::Decode(_) => false,
            ItemError::Source { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
            ),
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// `on_retry` is called with the 1-based number of the failed attempt and its
/// error before each wait, so callers can report progress.
///
/// Returns the successful result or the last error after all retry attempts
/// are exhausted (or the first non-retryable error).
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    config: &RetryConfig,
    mut operation: F,
    mut on_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    R: FnMut(u32, &E),
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );
                on_retry(attempt, &e);

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };
                tokio::time::sleep(jittered_delay).await;

                delay = next_delay(delay, config);
            }
            Err(e) => {
                if e.is_retryable() && config.max_attempts > 0 {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed without retry");
                }
                return Err(e);
            }
        }
    }
}

/// Grow `delay` by the backoff multiplier, capped at `max_delay`
///
/// The cap is applied in floating point so an overflowing product never
/// reaches `Duration` conversion.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    let max_secs = config.max_delay.as_secs_f64();
    let next_secs = (delay.as_secs_f64() * config.backoff_multiplier).min(max_secs);
    Duration::try_from_secs_f64(next_secs).unwrap_or(config.max_delay)
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
