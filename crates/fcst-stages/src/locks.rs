//! Per-run async locks
//!
//! Serialises lookup-then-create for one run inside this process. Calls
//! for different runs never wait on each other. Another process advancing
//! the same run is not covered.
use fcst_core::RunIdentity;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct RunLocks {
    slots: Mutex<HashMap<RunIdentity, Arc<AsyncMutex<()>>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder advances `run`.
    pub async fn acquire(&self, run: &RunIdentity) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = match self.slots.lock() {
                Ok(slots) => slots,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Slots nobody holds or waits on are dropped on the way.
            slots.retain(|key, slot| key == run || Arc::strong_count(slot) > 1);
            slots.entry(run.clone()).or_default().clone()
        };
        slot.lock_owned().await
    }
}
