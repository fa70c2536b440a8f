//! # Busy-worker accounting.
//!
//! [`BusyCounter`] counts handler executions currently inside an execution guard.
//! A slot is taken with [`BusyCounter::enter`] and released when the returned
//! [`BusySlot`] drops, so every increment has exactly one decrement whatever the
//! exit path (return, timeout, shutdown, panic, or the guard future being dropped).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared atomic counter of busy workers.
#[derive(Clone, Debug, Default)]
pub struct BusyCounter {
    count: Arc<AtomicU64>,
}

impl BusyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter; the returned slot decrements it on drop.
    #[must_use = "the slot is released as soon as it is dropped"]
    pub fn enter(&self) -> BusySlot {
        self.count.fetch_add(1, Ordering::AcqRel);
        BusySlot {
            count: Arc::clone(&self.count),
        }
    }

    /// Current number of busy workers.
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

/// RAII guard for one busy slot.
#[derive(Debug)]
pub struct BusySlot {
    count: Arc<AtomicU64>,
}

impl Drop for BusySlot {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}
