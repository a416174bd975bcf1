//! Counted cancellation
//!
//! Every Ctrl+C bumps a counter. A phase in flight remembers the count it
//! started with and is cancelled once the count moves past it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Shared interrupt counter
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<u32>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Records one interrupt
    pub fn interrupt(&self) {
        self.tx.send_modify(|count| *count = count.saturating_add(1));
    }

    /// Number of interrupts so far
    pub fn count(&self) -> u32 {
        *self.tx.borrow()
    }

    /// Resolves once an interrupt arrives after `seen`
    pub async fn interrupted_after(&self, seen: u32) {
        let mut rx = self.tx.subscribe();
        // the sender lives as long as self, so this cannot fail
        let _ = rx.wait_for(|count| *count > seen).await;
    }

    /// Waits up to `grace` for another interrupt after `seen`
    ///
    /// Returns true if the operator confirmed the abort.
    pub async fn confirm_abort(&self, seen: u32, grace: Duration) -> bool {
        tokio::time::timeout(grace, self.interrupted_after(seen))
            .await
            .is_ok()
    }

    /// Spawns a task turning every Ctrl+C into an interrupt
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let token = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Unable to listen for Ctrl+C: {}", e);
                    return;
                }
                token.interrupt();
                tracing::warn!(
                    "Interrupt received ({}); press Ctrl+C again to stop everything",
                    token.count()
                );
            }
        })
    }
}
