//! Process-wide cooperative shutdown flag

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// A cancellation flag shared by every worker.
///
/// The flag starts cleared, can be set any number of times (only the first
/// call has an effect) and is never reset. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Create a cleared signal
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Set the flag. Returns `true` only for the call that flipped it.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|triggered| {
            if *triggered {
                false
            } else {
                *triggered = true;
                true
            }
        })
    }

    /// Whether the flag has been set
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the flag is set
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// Wait until the flag is set or `timeout` elapses, whichever is first.
    /// Returns whether the flag is set.
    pub async fn await_trigger_or_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.triggered()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_starts_cleared() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
        assert!(!signal.await_trigger_or_timeout(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_trigger_is_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let signal = ShutdownSignal::new();
        let observer = signal.clone();
        signal.trigger();
        assert!(observer.is_triggered());
        assert!(observer.await_trigger_or_timeout(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_trigger() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();
        let started = Instant::now();
        let handle = tokio::spawn(async move { waiter.await_trigger_or_timeout(Duration::from_secs(10)).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        signal.trigger();

        assert!(handle.await.unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_triggered_resolves_immediately_when_already_set() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(100), signal.triggered())
            .await
            .expect("already-triggered signal should resolve at once");
    }
}
