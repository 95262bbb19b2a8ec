//! Shutdown coordination.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

/// Broadcasts a single shutdown signal to every long-running task
/// (HTTP server, config reloader, rate-limit purger).
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscriber. Only the first call has an effect.
    pub fn trigger(&self, reason: &str) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(reason, subscribers = self.tx.receiver_count(), "Shutdown triggered");
        let _ = self.tx.send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
