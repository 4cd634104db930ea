//! Full sync engine: copy everything in source into target.
//!
//! Two modes share one postcondition ("every record in source exists in
//! target with current field values"):
//!
//! - **Naive**: one `find` for the whole source, then upsert every record.
//! - **Paginated**: count once, then `skip`/`limit` pages of `batch_size`
//!   until the cursor reaches the captured count.
//!
//! The paginated total is captured once at the start and never re-queried.
//! Records added to source mid-pass may be missed (they arrive through the
//! delta path instead) and records removed mid-pass may shift later pages;
//! there is no snapshot isolation.

use crate::config::{validate_batch_size, FullSyncMode, SyncConfig};
use crate::cursor::BatchCursor;
use crate::error::{SyncError, SyncResult};
use crate::observer::{NoopObserver, SyncObserver};
use crate::report::{FailedPage, PassKind, SyncReport};
use crate::retry::with_retry;
use crate::writer::RecordWriter;
use recsync_store::{Filter, Query, SourceStore, TargetStore};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Copies the whole source into the target.
///
/// At most one pass (of either mode) runs per engine at a time; a second
/// concurrent call fails with [`SyncError::PassInProgress`].
pub struct FullSyncEngine<S: ?Sized, T: ?Sized> {
    config: SyncConfig,
    source: Arc<S>,
    writer: RecordWriter<T>,
    running: Mutex<()>,
}

impl<S, T> FullSyncEngine<S, T>
where
    S: SourceStore + ?Sized,
    T: TargetStore + ?Sized,
{
    /// Creates a new engine.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: SyncConfig, source: Arc<S>, target: Arc<T>) -> SyncResult<Self> {
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
            running: Mutex::new(()),
        })
    }

    /// Sets the observer notified after each upsert.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.writer = self.writer.with_observer(observer);
        self
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns true while a pass is running.
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Runs a full sync in the given mode, paging by the configured batch size.
    pub async fn run(&self, mode: FullSyncMode) -> SyncResult<SyncReport> {
        match mode {
            FullSyncMode::Naive => self.sync_all_no_limit().await,
            FullSyncMode::Paginated => self.sync_all_safely(self.config.batch_size).await,
        }
    }

    /// Fetches the entire source in one query and upserts every record.
    ///
    /// Individual upsert failures are retried per the retry policy and then
    /// reported; the remaining records are still processed.
    ///
    /// # Errors
    ///
    /// Fails if another full pass is running or the source query fails
    /// after retries.
    pub async fn sync_all_no_limit(&self) -> SyncResult<SyncReport> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| SyncError::PassInProgress(PassKind::FullNaive))?;

        let start = Instant::now();
        info!("naive full sync starting");

        let query = Query::all();
        let records = with_retry(&self.config.retry, "find all", || self.source.find(&query)).await?;

        let mut report = SyncReport::new(PassKind::FullNaive);
        report.pages.push(records.len());
        self.writer
            .write_all(
                PassKind::FullNaive,
                records,
                self.config.upsert_concurrency,
                &mut report,
            )
            .await;

        report.duration = start.elapsed();
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = report.duration.as_millis() as u64,
            "naive full sync finished"
        );
        Ok(report)
    }

    /// Copies the source in pages of `batch_size`, with a fresh cursor.
    ///
    /// # Errors
    ///
    /// See [`sync_all_safely_with`](Self::sync_all_safely_with).
    pub async fn sync_all_safely(&self, batch_size: u64) -> SyncResult<SyncReport> {
        let mut cursor = BatchCursor::new();
        self.sync_all_safely_with(batch_size, &mut cursor).await
    }

    /// Copies the source in pages of `batch_size`, advancing `cursor`.
    ///
    /// Pages are fetched strictly in increasing offset order. A page whose
    /// fetch keeps failing is recorded in
    /// [`SyncReport::failed_pages`] and skipped. The cursor is reset once
    /// the pass finishes.
    ///
    /// # Errors
    ///
    /// Fails with [`SyncError::InvalidConfig`] for a zero batch size (before
    /// any I/O), if another full pass is running, or if the initial count
    /// fails after retries.
    pub async fn sync_all_safely_with(
        &self,
        batch_size: u64,
        cursor: &mut BatchCursor,
    ) -> SyncResult<SyncReport> {
        validate_batch_size(batch_size)?;
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| SyncError::PassInProgress(PassKind::FullPaginated))?;

        let start = Instant::now();
        let total = with_retry(&self.config.retry, "count", || {
            self.source.count(&Filter::All)
        })
        .await?;
        info!(batch_size, total, "paginated full sync starting");

        let mut report = SyncReport::new(PassKind::FullPaginated);
        cursor.begin(total);

        while !cursor.is_complete() {
            let offset = cursor.position();
            let query = Query::all().skip(offset).limit(batch_size);
            let operation = format!("find page at {offset}");

            match with_retry(&self.config.retry, &operation, || self.source.find(&query)).await {
                Ok(records) => {
                    let returned = records.len();
                    debug!(offset, returned, "page fetched");
                    report.pages.push(returned);
                    self.writer
                        .write_all(
                            PassKind::FullPaginated,
                            records,
                            self.config.upsert_concurrency,
                            &mut report,
                        )
                        .await;
                    cursor.advance(batch_size, returned);
                }
                Err(error) => {
                    warn!(offset, batch_size, %error, "page fetch failed, skipping");
                    report.failed_pages.push(FailedPage {
                        offset,
                        limit: batch_size,
                        error: error.to_string(),
                    });
                    cursor.advance(batch_size, 0);
                }
            }
        }

        report.duration = start.elapsed();
        info!(
            pages = cursor.pages_issued(),
            fetched = cursor.fetched(),
            succeeded = report.succeeded,
            failed = report.failed,
            failed_pages = report.failed_pages.len(),
            duration_ms = report.duration.as_millis() as u64,
            "paginated full sync finished"
        );
        cursor.reset();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use recsync_store::{BusinessKey, MemoryStore, Record};
    use std::time::Duration;

    fn config() -> SyncConfig {
        SyncConfig::default().with_retry(
            RetryConfig::new(2)
                .with_initial_delay(Duration::ZERO)
                .with_jitter(false),
        )
    }

    fn seeded(n: usize) -> Arc<MemoryStore> {
        let store = MemoryStore::with_unique_key("name");
        for i in 0..n {
            store
                .put(Record::new().with_field("name", format!("company-{i:02}")))
                .unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn naive_copies_everything() {
        let source = seeded(13);
        let target = Arc::new(MemoryStore::with_unique_key("name"));
        let engine = FullSyncEngine::new(config(), source, Arc::clone(&target)).unwrap();

        let report = engine.sync_all_no_limit().await.unwrap();
        assert_eq!(report.kind, PassKind::FullNaive);
        assert_eq!(report.succeeded, 13);
        assert_eq!(report.inserted, 13);
        assert!(report.is_clean());
        assert_eq!(target.len(), 13);
    }

    #[tokio::test]
    async fn paginated_issues_expected_pages() {
        let source = seeded(13);
        let target = Arc::new(MemoryStore::with_unique_key("name"));
        let engine = FullSyncEngine::new(config(), source, Arc::clone(&target)).unwrap();

        let mut cursor = BatchCursor::new();
        let report = engine.sync_all_safely_with(5, &mut cursor).await.unwrap();

        assert_eq!(report.pages, vec![5, 5, 3]);
        assert_eq!(report.succeeded, 13);
        assert_eq!(target.len(), 13);
        assert!(!cursor.is_started());
    }

    #[tokio::test]
    async fn second_full_pass_updates() {
        let source = seeded(4);
        let target = Arc::new(MemoryStore::with_unique_key("name"));
        let engine = FullSyncEngine::new(config(), source, Arc::clone(&target)).unwrap();

        engine.sync_all_no_limit().await.unwrap();
        let report = engine.sync_all_safely(3).await.unwrap();

        assert_eq!(report.updated, 4);
        assert_eq!(report.inserted, 0);
        assert_eq!(target.len(), 4);
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let engine =
            FullSyncEngine::new(config(), seeded(1), Arc::new(MemoryStore::new())).unwrap();
        let result = engine.sync_all_safely(0).await;
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn empty_source_issues_no_pages() {
        let target = Arc::new(MemoryStore::new());
        let engine =
            FullSyncEngine::new(config(), seeded(0), Arc::clone(&target)).unwrap();

        let report = engine.sync_all_safely(5).await.unwrap();
        assert!(report.pages.is_empty());
        assert_eq!(report.attempted, 0);
        assert!(target.is_empty());
    }

    #[tokio::test]
    async fn closed_source_fails_the_pass() {
        let source = seeded(3);
        source.close();
        let engine = FullSyncEngine::new(config(), source, Arc::new(MemoryStore::new())).unwrap();

        assert!(engine.sync_all_no_limit().await.is_err());
        assert!(engine.sync_all_safely(2).await.is_err());
    }

    #[tokio::test]
    async fn records_without_key_are_reported() {
        let source = seeded(2);
        source.put(Record::new().with_field("owner", "nobody")).unwrap();
        let target = Arc::new(MemoryStore::new());
        let engine = FullSyncEngine::new(config(), source, Arc::clone(&target)).unwrap();

        let report = engine.sync_all_safely(2).await.unwrap();
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failed_keys[0].key, None);
        assert!(target.get("name", &BusinessKey::new("company-01")).is_some());
    }

    #[test]
    fn invalid_config_fails_construction() {
        let result = FullSyncEngine::new(
            SyncConfig::default().with_batch_size(0),
            seeded(0),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }
}
