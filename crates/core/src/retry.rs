//! Bounded exponential-backoff retry helper (SPEC_FULL.md §4.F), used by
//! handlers that call out to slow, flaky external collaborators (the LLM
//! client chief among them).
//!
//! Contract: invoke `f` until it returns `Ok`, or until `timeout` has
//! elapsed, doubling an initial 1s backoff up to a 300s cap between
//! attempts. Backoff sleeps are interruptible via [`ShutdownToken`] so a
//! worker shutdown aborts a stuck retry loop within about a second.

use std::future::Future;
use std::time::Duration;

use crate::shutdown::ShutdownToken;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("shutdown requested during retry backoff")]
    Shutdown,
    #[error("retry budget of {0:?} exhausted without a successful attempt")]
    TimedOut(Duration),
}

pub async fn retry_backoff<T, E, F, Fut>(
    shutdown: &ShutdownToken,
    timeout: Duration,
    mut f: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = tokio::time::Instant::now();
    let mut backoff = INITIAL_BACKOFF;

    loop {
        shutdown.check().map_err(|_| RetryError::Shutdown)?;

        match f().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                tracing::warn!(%error, backoff_secs = backoff.as_secs(), "retry_backoff_attempt_failed");
            }
        }

        if start.elapsed() >= timeout {
            return Err(RetryError::TimedOut(timeout));
        }

        shutdown
            .sleep_interruptible(backoff)
            .await
            .map_err(|_| RetryError::Shutdown)?;

        backoff = (backoff * 2).min(MAX_BACKOFF);

        if start.elapsed() >= timeout {
            return Err(RetryError::TimedOut(timeout));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_immediately_without_sleeping() {
        let shutdown = ShutdownToken::new();
        let result: Result<u32, RetryError> =
            retry_backoff(&shutdown, Duration::from_secs(10), || async { Ok::<_, &str>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let shutdown = ShutdownToken::new();
        let attempts = AtomicU32::new(0);
        let result = retry_backoff(&shutdown, Duration::from_secs(600), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("not yet")
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_budget_exhausted() {
        let shutdown = ShutdownToken::new();
        let result: Result<(), RetryError> =
            retry_backoff(&shutdown, Duration::from_secs(5), || async { Err::<(), _>("always") }).await;
        assert!(matches!(result, Err(RetryError::TimedOut(_))));
    }

    #[tokio::test]
    async fn aborts_immediately_if_already_shut_down() {
        let shutdown = ShutdownToken::new();
        shutdown.trip();
        let result: Result<(), RetryError> =
            retry_backoff(&shutdown, Duration::from_secs(10), || async { Ok::<(), &str>(()) }).await;
        assert!(matches!(result, Err(RetryError::Shutdown)));
    }
}
