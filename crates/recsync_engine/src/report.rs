//! Per-pass reports.

use recsync_store::BusinessKey;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Which engine produced a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Single-query full sync.
    FullNaive,
    /// Paged full sync.
    FullPaginated,
    /// Pending-changes sync.
    Delta,
}

impl PassKind {
    /// Returns true for both full sync flavours.
    pub fn is_full(&self) -> bool {
        matches!(self, PassKind::FullNaive | PassKind::FullPaginated)
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassKind::FullNaive => f.write_str("naive full sync"),
            PassKind::FullPaginated => f.write_str("paginated full sync"),
            PassKind::Delta => f.write_str("delta"),
        }
    }
}

/// How an upsert landed in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Upserted {
    /// No record matched the key; a new one was inserted.
    Inserted,
    /// An existing record was patched.
    Updated,
}

/// A record that could not be synchronized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRecord {
    /// Business key, when the record had one.
    pub key: Option<BusinessKey>,
    /// Rendered error.
    pub error: String,
}

/// A page whose fetch failed after every retry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedPage {
    /// Offset the page was requested at.
    pub offset: u64,
    /// Page size requested.
    pub limit: u64,
    /// Rendered error.
    pub error: String,
}

/// Outcome of one sync pass.
///
/// Failures never hide partial success: every attempted record is accounted
/// for in exactly one of `succeeded`, `failed` or `skipped`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    /// Engine that ran.
    pub kind: PassKind,
    /// Records the pass tried to upsert.
    pub attempted: u64,
    /// Records upserted.
    pub succeeded: u64,
    /// Records that failed.
    pub failed: u64,
    /// Delta keys whose record no longer exists in source.
    pub skipped: u64,
    /// Of `succeeded`, how many were inserts.
    pub inserted: u64,
    /// Of `succeeded`, how many were updates.
    pub updated: u64,
    /// Failed records with their errors.
    pub failed_keys: Vec<FailedRecord>,
    /// Pages that could not be fetched.
    pub failed_pages: Vec<FailedPage>,
    /// Record count of each page fetched, in offset order.
    pub pages: Vec<usize>,
    /// Wall-clock duration.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl SyncReport {
    /// Creates an empty report.
    pub fn new(kind: PassKind) -> Self {
        Self {
            kind,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            inserted: 0,
            updated: 0,
            failed_keys: Vec::new(),
            failed_pages: Vec::new(),
            pages: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Returns true if nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.failed_pages.is_empty()
    }

    /// Business keys of the failed records.
    pub fn failed_business_keys(&self) -> Vec<BusinessKey> {
        self.failed_keys.iter().filter_map(|f| f.key.clone()).collect()
    }

    pub(crate) fn record_success(&mut self, outcome: Upserted) {
        self.attempted += 1;
        self.succeeded += 1;
        match outcome {
            Upserted::Inserted => self.inserted += 1,
            Upserted::Updated => self.updated += 1,
        }
    }

    pub(crate) fn record_failure(&mut self, key: Option<BusinessKey>, error: impl fmt::Display) {
        self.attempted += 1;
        self.failed += 1;
        self.failed_keys.push(FailedRecord {
            key,
            error: error.to_string(),
        });
    }

    pub(crate) fn record_skip(&mut self) {
        self.attempted += 1;
        self.skipped += 1;
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: attempted={} succeeded={} failed={} skipped={} (inserted={} updated={}) in {:?}",
            self.kind,
            self.attempted,
            self.succeeded,
            self.failed,
            self.skipped,
            self.inserted,
            self.updated,
            self.duration
        )?;
        if !self.pages.is_empty() {
            write!(f, " pages={:?}", self.pages)?;
        }
        if !self.failed_pages.is_empty() {
            write!(f, " failed_pages={}", self.failed_pages.len())?;
        }
        Ok(())
    }
}
