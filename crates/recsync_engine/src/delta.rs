//! Delta sync engine: propagate only the keys the change tracker holds.
//!
//! A pass snapshots the tracker, dedupes the keys, re-reads each record from
//! source (never trusting the notification) and upserts it. Afterwards it
//! drains the snapshot, keeping the keys that failed so the next pass
//! retries them.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::observer::{NoopObserver, SyncObserver};
use crate::report::{PassKind, SyncReport, Upserted};
use crate::retry::with_retry;
use crate::tracker::ChangeTracker;
use crate::writer::{RecordWriter, WriteOutcome};
use futures::stream::{self, StreamExt};
use recsync_store::{BusinessKey, Filter, SourceStore, TargetStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

enum KeyOutcome {
    Written(Upserted),
    /// The record no longer exists in source.
    Vanished,
    Failed(SyncError),
}

/// Syncs records whose keys are pending in a [`ChangeTracker`].
pub struct DeltaSyncEngine<S: ?Sized, T: ?Sized> {
    config: SyncConfig,
    source: Arc<S>,
    writer: RecordWriter<T>,
    tracker: Arc<ChangeTracker>,
    running: Mutex<()>,
}

impl<S, T> DeltaSyncEngine<S, T>
where
    S: SourceStore + ?Sized,
    T: TargetStore + ?Sized,
{
    /// Creates a new engine draining `tracker`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `config` does not validate.
    pub fn new(
        config: SyncConfig,
        source: Arc<S>,
        target: Arc<T>,
        tracker: Arc<ChangeTracker>,
    ) -> SyncResult<Self> {
        config.validate()?;
        let writer = RecordWriter::new(
            target,
            config.key_field.clone(),
            config.retry.clone(),
            Arc::new(NoopObserver),
        );
        Ok(Self {
            config,
            source,
            writer,
            tracker,
            running: Mutex::new(()),
        })
    }

    /// Sets the observer notified after each upsert.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.writer = self.writer.with_observer(observer);
        self
    }

    /// Gets the tracker this engine drains.
    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.tracker
    }

    /// Returns true while a pass is running.
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Runs one delta pass over the currently pending keys.
    ///
    /// With nothing pending the pass returns immediately without touching
    /// either store. Keys that fail stay pending; their errors are listed in
    /// [`SyncReport::failed_keys`].
    ///
    /// # Errors
    ///
    /// Fails only if another delta pass is already running.
    pub async fn sync_new_changes(&self) -> SyncResult<SyncReport> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| SyncError::PassInProgress(PassKind::Delta))?;

        let mut report = SyncReport::new(PassKind::Delta);
        let snapshot = self.tracker.snapshot();
        if snapshot.is_empty() {
            debug!("no pending changes");
            return Ok(report);
        }

        let start = Instant::now();
        let keys = snapshot.unique_keys();
        info!(
            pending = snapshot.len(),
            unique = keys.len(),
            "delta sync starting"
        );

        let outcomes: Vec<(BusinessKey, KeyOutcome)> = stream::iter(keys)
            .map(|key| async move {
                let outcome = self.sync_key(&key).await;
                (key, outcome)
            })
            .buffer_unordered(self.config.upsert_concurrency.max(1))
            .collect()
            .await;

        let mut failed = HashSet::new();
        for (key, outcome) in outcomes {
            match outcome {
                KeyOutcome::Written(upserted) => report.record_success(upserted),
                KeyOutcome::Vanished => report.record_skip(),
                KeyOutcome::Failed(error) => {
                    failed.insert(key.clone());
                    report.record_failure(Some(key), error);
                }
            }
        }

        let drained = self.tracker.drain(&snapshot, &failed);
        report.duration = start.elapsed();
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            drained,
            still_pending = self.tracker.pending_len(),
            duration_ms = report.duration.as_millis() as u64,
            "delta sync finished"
        );
        Ok(report)
    }

    async fn sync_key(&self, key: &BusinessKey) -> KeyOutcome {
        let filter = Filter::key(self.writer.key_field(), key);
        let operation = format!("fetch {key}");

        let fetched = with_retry(&self.config.retry, &operation, || {
            self.source.find_one(&filter)
        })
        .await;

        match fetched {
            Ok(Some(record)) => match self.writer.write(PassKind::Delta, &record).await {
                WriteOutcome::Written(upserted) => KeyOutcome::Written(upserted),
                WriteOutcome::Failed { error, .. } => KeyOutcome::Failed(error),
            },
            Ok(None) => {
                debug!(%key, "changed record no longer in source");
                KeyOutcome::Vanished
            }
            Err(error) => {
                warn!(%key, %error, "fetch failed, key stays pending");
                KeyOutcome::Failed(error)
            }
        }
    }
}
