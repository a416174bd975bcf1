//! The shared automation-session slot
//!
//! Sites never run concurrently: every phase holds the single slot.

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Pool of session slots, one by default
#[derive(Debug, Clone)]
pub struct SessionPool {
    slots: Arc<Semaphore>,
}

/// A held session slot, released on drop
#[derive(Debug)]
pub struct SessionSlot {
    pub site: String,
    _permit: OwnedSemaphorePermit,
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionPool {
    pub fn new() -> Self {
        Self::with_slots(1)
    }

    pub fn with_slots(slots: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(slots)),
        }
    }

    /// Waits for a free slot
    pub async fn acquire(&self, site: &str) -> Result<SessionSlot, AcquireError> {
        let permit = self.slots.clone().acquire_owned().await?;
        tracing::trace!("{} acquired a session slot", site);
        Ok(SessionSlot {
            site: site.to_string(),
            _permit: permit,
        })
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}
