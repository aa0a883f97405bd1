//! Bounded wait for an external state transition

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a bounded wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition held on the given 1-based attempt
    Satisfied { attempts: u32 },
    /// Every attempt ran without the condition holding
    Exhausted { attempts: u32 },
    /// The token fired before the condition held
    Cancelled,
}

impl WaitOutcome {
    pub fn is_satisfied(self) -> bool {
        matches!(self, WaitOutcome::Satisfied { .. })
    }
}

/// Sleep `interval`, then run `check`, up to `max_attempts` times.
///
/// A failed check is logged and counts as "not yet"; it never ends the wait
/// early.
pub async fn wait_until<E, F, Fut>(
    max_attempts: u32,
    interval: Duration,
    cancel: &CancellationToken,
    mut check: F,
) -> WaitOutcome
where
    E: fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    for attempt in 1..=max_attempts {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return WaitOutcome::Cancelled,
            _ = tokio::time::sleep(interval) => {}
        }

        match check(attempt).await {
            Ok(true) => return WaitOutcome::Satisfied { attempts: attempt },
            Ok(false) => {
                tracing::debug!(attempt, max_attempts, "Condition not met yet");
            }
            Err(e) => {
                tracing::warn!(attempt, max_attempts, error = %e, "Condition check failed");
            }
        }
    }

    WaitOutcome::Exhausted {
        attempts: max_attempts,
    }
}
