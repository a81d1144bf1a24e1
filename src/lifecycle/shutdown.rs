//! Shutdown and cancellation coordination.

use tokio::sync::broadcast::{self, error::TryRecvError};

/// Coordinator for cooperative shutdown.
///
/// Provides a broadcast channel that long-running tasks subscribe to. The
/// daemon owns one for the whole process; each port monitor owns its own.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking check for a pending signal. A dropped coordinator counts
/// as triggered.
pub fn triggered(rx: &mut broadcast::Receiver<()>) -> bool {
    !matches!(rx.try_recv(), Err(TryRecvError::Empty))
}
