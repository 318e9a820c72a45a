//! Structured cooperative cancellation.
//!
//! The original system sets a mutable process-wide boolean from a signal
//! handler and polls it from long sleeps. SPEC_FULL.md §9 calls for
//! structured cancellation instead; a [`tokio_util::sync::CancellationToken`]
//! gives the same cooperative-check contract (sub-second granularity at
//! every suspension point) without the global mutable state.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Raised (returned) when a cooperative check observes that shutdown has
/// been requested.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("shutdown requested")]
pub struct ShutdownRequested;

/// A cheaply-cloneable handle shared between a process's signal handler
/// and every task that needs to observe shutdown.
#[derive(Clone, Default)]
pub struct ShutdownToken(CancellationToken);

impl ShutdownToken {
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    /// Trip the token. Idempotent.
    pub fn trip(&self) {
        self.0.cancel();
    }

    pub fn is_tripped(&self) -> bool {
        self.0.is_cancelled()
    }

    pub fn check(&self) -> Result<(), ShutdownRequested> {
        if self.is_tripped() {
            Err(ShutdownRequested)
        } else {
            Ok(())
        }
    }

    /// Sleep for `dur`, decomposed into <=1s increments so shutdown is
    /// observed promptly, erroring early if the token trips mid-sleep.
    pub async fn sleep_interruptible(&self, dur: Duration) -> Result<(), ShutdownRequested> {
        const STEP: Duration = Duration::from_secs(1);
        let mut remaining = dur;
        loop {
            self.check()?;
            if remaining.is_zero() {
                return Ok(());
            }
            let this_step = remaining.min(STEP);
            tokio::select! {
                _ = tokio::time::sleep(this_step) => {}
                _ = self.0.cancelled() => return Err(ShutdownRequested),
            }
            remaining -= this_step;
        }
    }

    /// Install SIGTERM/SIGINT handlers that trip this token. Returns a
    /// task handle the caller should not need to await; it completes
    /// once a signal is observed (or never, if none arrives).
    #[cfg(unix)]
    pub fn spawn_signal_trap(&self) -> tokio::task::JoinHandle<()> {
        let token = self.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => return,
            };
            let mut int = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(_) => return,
            };
            tokio::select! {
                _ = term.recv() => tracing::info!(signal = "SIGTERM", "shutdown_signal_received"),
                _ = int.recv() => tracing::info!(signal = "SIGINT", "shutdown_signal_received"),
            }
            token.trip();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_token_is_not_tripped() {
        let token = ShutdownToken::new();
        assert!(!token.is_tripped());
        assert!(token.check().is_ok());
    }

    #[tokio::test]
    async fn tripped_token_fails_check() {
        let token = ShutdownToken::new();
        token.trip();
        assert!(token.is_tripped());
        assert!(token.check().is_err());
    }

    #[tokio::test]
    async fn sleep_interruptible_returns_err_when_tripped_mid_sleep() {
        let token = ShutdownToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.sleep_interruptible(Duration::from_secs(30)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.trip();
        let result = handle.await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn sleep_interruptible_completes_normally_without_shutdown() {
        let token = ShutdownToken::new();
        let result = token.sleep_interruptible(Duration::from_millis(5)).await;
        assert!(result.is_ok());
    }
}
