//! Process-wide shutdown signalling.
//!
//! One [`ShutdownController`] lives in the supervisor; every concurrent
//! actor (accept loop, connection workers, timestamp writer, local-handle
//! lock waits) holds a [`ShutdownSignal`]. The state is an atomic flag for
//! cheap polling plus a `watch` channel for async wake-ups; the flag is
//! safe to read from any context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Owner side: trips the shutdown state exactly once.
#[derive(Debug)]
pub struct ShutdownController {
    requested: Arc<AtomicBool>,
    tx: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// A new signal handle observing this controller.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            requested: Arc::clone(&self.requested),
            rx: self.tx.subscribe(),
        }
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side: poll with [`is_requested`](Self::is_requested) or await
/// [`wait`](Self::wait).
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested; immediately if it already
    /// was.
    pub async fn wait(&mut self) {
        if self.is_requested() {
            return;
        }
        // A closed channel means the controller is gone; treat it as
        // shutdown rather than waiting forever.
        let _ = self.rx.wait_for(|requested| *requested).await;
    }
}
