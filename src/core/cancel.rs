//! Ambient cancellation signal shared by every wait and external command

use std::time::Duration;
use tokio::sync::watch;

/// Sending half of the cancellation signal, owned by the invoking surface
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half of the cancellation signal
///
/// Cheap to clone; every clone observes the same [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Create a linked handle/signal pair
    pub fn new() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_, signal) = Self::new();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal fires
    ///
    /// Stays pending forever when the handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `duration` unless cancelled first
    ///
    /// Returns `false` when the signal fired before the duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
