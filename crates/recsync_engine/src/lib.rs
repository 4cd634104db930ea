//! # recsync Engine
//!
//! One-way source → target synchronization for recsync.
//!
//! This crate provides:
//! - Full sync engine (naive single query, or paginated by batch size)
//! - Delta sync engine driven by a change tracker
//! - Change tracker with sequence-numbered entries and safe draining
//! - Batch cursor for paginated copies
//! - Sync scheduler (UNSYNCED → SYNCED, then a delta pass every tick)
//! - Retry with exponential backoff
//! - Observer hook called after each upsert
//!
//! ## Architecture
//!
//! Data flows one way: source → engine → target. Whatever mutates the source
//! reports the business keys it touched through a [`ChangeNotifier`]; the
//! [`ChangeTracker`] collects them until the next delta pass. The
//! [`SyncScheduler`] bootstraps the target with one full sync and then runs
//! a delta pass every poll interval.
//!
//! ## Key Invariants
//!
//! - Every record in source ends up in target exactly once per business key
//! - The UNSYNCED → SYNCED transition happens at most once per process
//! - Ticks never overlap
//! - Keys appended while a delta pass runs stay pending for the next one
//! - A delta pass with nothing pending does no I/O
//! - Failed keys are retried on the next pass, never silently dropped

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod cursor;
mod delta;
mod error;
mod full;
mod observer;
mod report;
mod retry;
mod scheduler;
mod state;
mod tracker;
mod writer;

pub use config::{FullSyncMode, RetryConfig, SyncConfig};
pub use cursor::BatchCursor;
pub use delta::DeltaSyncEngine;
pub use error::{SyncError, SyncResult};
pub use full::FullSyncEngine;
pub use observer::{
    CountingObserver, NoopObserver, ObserverResult, SyncObserver, TracingObserver, UpsertEvent,
};
pub use report::{FailedPage, FailedRecord, PassKind, SyncReport, Upserted};
pub use retry::with_retry;
pub use scheduler::{
    SchedulerStats, StartOutcome, SyncScheduler, SyncSchedulerBuilder, TickOutcome,
};
pub use state::{SyncPhase, SyncState};
pub use tracker::{ChangeEntry, ChangeNotifier, ChangeSnapshot, ChangeTracker};
