//! Pagination cursor for paged full sync.

/// Tracks how far a paginated full sync has progressed.
///
/// A fresh cursor is "not started" (the `-1` sentinel); [`begin`](Self::begin)
/// normalizes it to offset 0 and pins the total record count, which is never
/// re-queried while the pass runs. The cursor is handed to the engine as
/// `&mut`, so two passes can never share one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCursor {
    offset: Option<u64>,
    total_known: Option<u64>,
    pages_issued: u64,
    fetched: u64,
}

impl BatchCursor {
    /// Creates a cursor that has not started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true until [`begin`](Self::begin) is called.
    pub fn is_started(&self) -> bool {
        self.offset.is_some()
    }

    /// Starts the cursor at offset 0 against a captured total.
    pub fn begin(&mut self, total: u64) {
        self.offset = Some(0);
        self.total_known = Some(total);
        self.pages_issued = 0;
        self.fetched = 0;
    }

    /// Current offset, with the not-started sentinel reported as -1.
    pub fn offset(&self) -> i64 {
        self.offset.map_or(-1, |o| o as i64)
    }

    /// Offset of the next page; 0 when not started.
    pub fn position(&self) -> u64 {
        self.offset.unwrap_or(0)
    }

    /// Total captured when the pass began.
    pub fn total_known(&self) -> Option<u64> {
        self.total_known
    }

    /// Pages requested so far.
    pub fn pages_issued(&self) -> u64 {
        self.pages_issued
    }

    /// Records returned by the pages so far.
    pub fn fetched(&self) -> u64 {
        self.fetched
    }

    /// Moves past a page of `batch_size` that returned `returned` records.
    pub fn advance(&mut self, batch_size: u64, returned: usize) {
        self.offset = Some(self.position().saturating_add(batch_size));
        self.pages_issued += 1;
        self.fetched += returned as u64;
    }

    /// Returns true once the offset has reached the captured total.
    pub fn is_complete(&self) -> bool {
        match (self.offset, self.total_known) {
            (Some(offset), Some(total)) => offset >= total,
            _ => false,
        }
    }

    /// Discards progress, returning to the not-started state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
