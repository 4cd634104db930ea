//! Change tracker: the dirty set of business keys awaiting a delta pass.
//!
//! Whatever mutates the source calls [`ChangeNotifier::notify_changed`];
//! the delta engine takes a [`ChangeSnapshot`], processes it, then drains
//! exactly the entries the snapshot captured.
//!
//! # Invariants
//!
//! - Every entry gets a sequence number strictly greater than any before it
//! - A drain removes only entries with `sequence <= snapshot.high_water()`,
//!   so anything appended while a pass is running survives the drain
//! - Duplicates are allowed; consumers dedupe by key

use parking_lot::Mutex;
use recsync_store::BusinessKey;
use std::collections::{HashSet, VecDeque};
use tracing::trace;

/// Receives "this key changed in source" notifications.
pub trait ChangeNotifier: Send + Sync {
    /// Records that the record keyed `key` was mutated.
    fn notify_changed(&self, key: BusinessKey);
}

/// One pending change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    /// Append order, starting at 1.
    pub sequence: u64,
    /// Key of the changed record.
    pub key: BusinessKey,
}

/// The pending entries as they stood when a pass began.
#[derive(Debug, Clone, Default)]
pub struct ChangeSnapshot {
    entries: Vec<ChangeEntry>,
    high_water: u64,
}

impl ChangeSnapshot {
    /// Returns true if nothing was pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of captured entries, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Highest sequence captured (0 when empty).
    pub fn high_water(&self) -> u64 {
        self.high_water
    }

    /// The captured entries in append order.
    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    /// Distinct keys in first-seen order.
    pub fn unique_keys(&self) -> Vec<BusinessKey> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        self.entries
            .iter()
            .filter(|e| seen.insert(&e.key))
            .map(|e| e.key.clone())
            .collect()
    }
}

#[derive(Debug)]
struct TrackerInner {
    entries: VecDeque<ChangeEntry>,
    next_sequence: u64,
}

/// Concurrency-safe append/snapshot/drain log of changed keys.
#[derive(Debug)]
pub struct ChangeTracker {
    inner: Mutex<TrackerInner>,
}

impl ChangeTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                entries: VecDeque::new(),
                next_sequence: 1,
            }),
        }
    }

    /// Appends a change and returns its sequence number.
    pub fn append(&self, key: BusinessKey) -> u64 {
        let mut inner = self.inner.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        trace!(%key, sequence, "change recorded");
        inner.entries.push_back(ChangeEntry { sequence, key });
        sequence
    }

    /// Captures the current pending entries without removing them.
    pub fn snapshot(&self) -> ChangeSnapshot {
        let inner = self.inner.lock();
        let entries: Vec<ChangeEntry> = inner.entries.iter().cloned().collect();
        let high_water = entries.last().map_or(0, |e| e.sequence);
        ChangeSnapshot {
            entries,
            high_water,
        }
    }

    /// Removes the entries captured by `snapshot`, except those whose key is
    /// in `retain`. Returns the number of entries removed.
    pub fn drain(&self, snapshot: &ChangeSnapshot, retain: &HashSet<BusinessKey>) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        let high_water = snapshot.high_water;
        inner
            .entries
            .retain(|e| e.sequence > high_water || retain.contains(&e.key));
        before - inner.entries.len()
    }

    /// Appends every key again, e.g. records a full sync failed to copy.
    pub fn requeue<I>(&self, keys: I)
    where
        I: IntoIterator<Item = BusinessKey>,
    {
        for key in keys {
            self.append(key);
        }
    }

    /// Number of pending entries, duplicates included.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Number of pending entries for `key`.
    pub fn pending_for(&self, key: &BusinessKey) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| &e.key == key)
            .count()
    }

    /// Distinct pending keys in first-seen order.
    pub fn pending_keys(&self) -> Vec<BusinessKey> {
        self.snapshot().unique_keys()
    }
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier for ChangeTracker {
    fn notify_changed(&self, key: BusinessKey) {
        self.append(key);
    }
}
