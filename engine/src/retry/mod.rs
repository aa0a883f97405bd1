//! Bounded retry with exponential backoff
//!
//! `with_backoff` reruns a fallible async operation until it succeeds or the
//! attempt budget is spent. The delay after failed attempt `n` is
//! `base_delay * 2^(n-1)`: no jitter, no cap, and no sleep after the final
//! attempt.

pub mod wait;

pub use wait::{wait_until, WaitOutcome};

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The last failure of an exhausted retry loop
#[derive(Debug, Error)]
#[error("all retries failed after {attempts} attempts: {last}")]
pub struct RetryError<E: fmt::Display + fmt::Debug> {
    pub attempts: u32,
    pub last: E,
}

/// Delay slept after the `attempt`-th failure (1-based)
pub fn backoff_delay(base_delay: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base_delay.saturating_mul(factor)
}

/// Run `operation` up to `max_attempts` times.
///
/// The closure receives the 1-based attempt number. A `max_attempts` of zero
/// is treated as one.
pub async fn with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: fmt::Display + fmt::Debug,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= max_attempts => {
                return Err(RetryError {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = backoff_delay(base_delay, attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
