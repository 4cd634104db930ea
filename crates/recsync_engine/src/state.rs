//! Process-wide "has a full sync ever completed" flag.

use std::sync::atomic::{AtomicBool, Ordering};

/// The scheduler's two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No full sync has completed yet.
    Unsynced,
    /// A full sync completed; every tick runs a delta pass.
    Synced,
}

impl SyncPhase {
    /// Returns true if the next tick should run a full sync.
    pub fn needs_full_sync(&self) -> bool {
        matches!(self, SyncPhase::Unsynced)
    }
}

/// Sync state flag. Starts false and is set at most once.
#[derive(Debug, Default)]
pub struct SyncState {
    synced: AtomicBool,
}

impl SyncState {
    /// Creates an unsynced state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state that already saw a full sync, e.g. restored after a
    /// warm restart.
    pub fn synced() -> Self {
        Self {
            synced: AtomicBool::new(true),
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> SyncPhase {
        if self.is_synced() {
            SyncPhase::Synced
        } else {
            SyncPhase::Unsynced
        }
    }

    /// Returns true once a full sync has completed.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Sets the flag. Returns true only for the call that flipped it.
    pub fn mark_synced(&self) -> bool {
        self.synced
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
