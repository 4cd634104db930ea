//! The top-level sync loop.
//!
//! The scheduler owns one full and one delta engine over the same stores and
//! drives them from a two-state machine:
//!
//! ```text
//!   UNSYNCED --(full sync without failed pages)--> SYNCED
//!   SYNCED   --(every tick)--> delta pass --> SYNCED
//! ```
//!
//! `start()` bootstraps with a full sync and then spawns a polling task.
//! Ticks never overlap: a tick that fires while another is running is
//! skipped. `stop()` cancels future ticks and waits for the in-flight one.

use crate::config::SyncConfig;
use crate::delta::DeltaSyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::full::FullSyncEngine;
use crate::observer::{NoopObserver, SyncObserver};
use crate::report::SyncReport;
use crate::state::{SyncPhase, SyncState};
use crate::tracker::ChangeTracker;
use parking_lot::{Mutex as SyncMutex, RwLock};
use recsync_store::{SourceStore, TargetStore};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What `start()` did before the polling task was spawned.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// The bootstrap full sync ran.
    FullSynced(SyncReport),
    /// The state was already synced; polling starts straight away.
    AlreadySynced,
    /// The bootstrap failed. The state stays unsynced and the first tick
    /// retries the full sync.
    Deferred {
        /// Why the bootstrap failed.
        error: SyncError,
    },
}

/// What a single tick did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// The state was unsynced, so the tick ran a full sync.
    FullSync(SyncReport),
    /// A delta pass.
    Delta(SyncReport),
    /// Another tick was still running.
    Skipped,
}

/// Counters kept across the scheduler's lifetime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    /// Ticks that ran to completion or failed.
    pub ticks_run: u64,
    /// Ticks skipped because another was running.
    pub ticks_skipped: u64,
    /// Full syncs run, including the bootstrap.
    pub full_syncs: u64,
    /// Delta passes run.
    pub delta_passes: u64,
    /// Ticks that returned an error or panicked.
    pub tick_failures: u64,
    /// The most recent tick error.
    pub last_error: Option<String>,
    /// The most recent pass report.
    pub last_report: Option<SyncReport>,
}

/// Builder for [`SyncScheduler`].
pub struct SyncSchedulerBuilder<S: ?Sized, T: ?Sized> {
    config: SyncConfig,
    source: Arc<S>,
    target: Arc<T>,
    observer: Option<Arc<dyn SyncObserver>>,
    tracker: Option<Arc<ChangeTracker>>,
    state: Option<Arc<SyncState>>,
}

impl<S, T> SyncSchedulerBuilder<S, T>
where
    S: SourceStore + ?Sized + 'static,
    T: TargetStore + ?Sized + 'static,
{
    /// Sets the observer both engines notify after each upsert.
    pub fn observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Uses an existing change tracker instead of a fresh one.
    pub fn tracker(mut self, tracker: Arc<ChangeTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Uses an existing sync state, e.g. one restored as already synced.
    pub fn state(mut self, state: Arc<SyncState>) -> Self {
        self.state = Some(state);
        self
    }

    /// Builds the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if the configuration does not
    /// validate.
    pub fn build(self) -> SyncResult<SyncScheduler<S, T>> {
        self.config.validate()?;

        let observer = self.observer.unwrap_or_else(|| Arc::new(NoopObserver));
        let tracker = self.tracker.unwrap_or_default();
        let state = self.state.unwrap_or_default();

        let full = FullSyncEngine::new(
            self.config.clone(),
            Arc::clone(&self.source),
            Arc::clone(&self.target),
        )?
        .with_observer(Arc::clone(&observer));
        let delta = DeltaSyncEngine::new(
            self.config.clone(),
            self.source,
            self.target,
            Arc::clone(&tracker),
        )?
        .with_observer(observer);

        Ok(SyncScheduler {
            inner: Arc::new(SchedulerInner {
                config: self.config,
                full,
                delta,
                tracker,
                state,
                full_sync_lock: Mutex::new(()),
                tick_lock: Mutex::new(()),
                stats: RwLock::new(SchedulerStats::default()),
            }),
            cancel: CancellationToken::new(),
            task: SyncMutex::new(None),
            started: AtomicBool::new(false),
        })
    }
}

struct SchedulerInner<S: ?Sized, T: ?Sized> {
    config: SyncConfig,
    full: FullSyncEngine<S, T>,
    delta: DeltaSyncEngine<S, T>,
    tracker: Arc<ChangeTracker>,
    state: Arc<SyncState>,
    /// Serializes full syncs so the bootstrap and a tick never both run one.
    full_sync_lock: Mutex<()>,
    tick_lock: Mutex<()>,
    stats: RwLock<SchedulerStats>,
}

impl<S, T> SchedulerInner<S, T>
where
    S: SourceStore + ?Sized,
    T: TargetStore + ?Sized,
{
    /// Runs a full sync unless one already completed.
    ///
    /// Returns `None` if the state was synced by the time the lock was held.
    async fn ensure_full_sync(&self) -> SyncResult<Option<SyncReport>> {
        let _guard = self.full_sync_lock.lock().await;
        if self.state.is_synced() {
            return Ok(None);
        }

        let report = self.full.run(self.config.full_sync_mode).await?;

        let failed = report.failed_business_keys();
        if !failed.is_empty() {
            warn!(
                count = failed.len(),
                "requeueing records that failed during full sync"
            );
            self.tracker.requeue(failed);
        }

        if report.failed_pages.is_empty() {
            if self.state.mark_synced() {
                info!(records = report.succeeded, "target synced");
            }
        } else {
            warn!(
                failed_pages = report.failed_pages.len(),
                "full sync incomplete, staying unsynced"
            );
        }

        let mut stats = self.stats.write();
        stats.full_syncs += 1;
        stats.last_report = Some(report.clone());
        Ok(Some(report))
    }

    async fn tick(&self) -> SyncResult<TickOutcome> {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            debug!("previous tick still running, skipping");
            self.stats.write().ticks_skipped += 1;
            return Ok(TickOutcome::Skipped);
        };

        let result = self.run_tick().await;

        let mut stats = self.stats.write();
        stats.ticks_run += 1;
        if let Err(e) = &result {
            stats.tick_failures += 1;
            stats.last_error = Some(e.to_string());
        }
        result
    }

    async fn run_tick(&self) -> SyncResult<TickOutcome> {
        if !self.state.is_synced() {
            if let Some(report) = self.ensure_full_sync().await? {
                return Ok(TickOutcome::FullSync(report));
            }
        }

        let report = self.delta.sync_new_changes().await?;
        let mut stats = self.stats.write();
        stats.delta_passes += 1;
        stats.last_report = Some(report.clone());
        Ok(TickOutcome::Delta(report))
    }
}

/// Drives full and delta syncs on a fixed cadence.
///
/// # Example
///
/// ```rust,no_run
/// use recsync_engine::{SyncConfig, SyncScheduler};
/// use recsync_store::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn run() -> recsync_engine::SyncResult<()> {
/// let source = Arc::new(MemoryStore::with_unique_key("name"));
/// let target = Arc::new(MemoryStore::with_unique_key("name"));
///
/// let scheduler = SyncScheduler::builder(SyncConfig::default(), source, target).build()?;
/// scheduler.start().await?;
/// // ...
/// scheduler.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct SyncScheduler<S: ?Sized, T: ?Sized> {
    inner: Arc<SchedulerInner<S, T>>,
    cancel: CancellationToken,
    task: SyncMutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl<S, T> SyncScheduler<S, T>
where
    S: SourceStore + ?Sized + 'static,
    T: TargetStore + ?Sized + 'static,
{
    /// Starts building a scheduler over `source` and `target`.
    pub fn builder(
        config: SyncConfig,
        source: Arc<S>,
        target: Arc<T>,
    ) -> SyncSchedulerBuilder<S, T> {
        SyncSchedulerBuilder {
            config,
            source,
            target,
            observer: None,
            tracker: None,
            state: None,
        }
    }

    /// Bootstraps the target and spawns the polling task.
    ///
    /// A failing bootstrap does not fail `start()`: it is reported as
    /// [`StartOutcome::Deferred`] and the next tick retries it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyStarted`] on a second call and
    /// [`SyncError::Stopped`] after [`stop`](Self::stop).
    pub async fn start(&self) -> SyncResult<StartOutcome> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Stopped);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyStarted);
        }

        let outcome = if self.inner.state.is_synced() {
            info!("already synced, skipping bootstrap");
            StartOutcome::AlreadySynced
        } else {
            match self.inner.ensure_full_sync().await {
                Ok(Some(report)) => StartOutcome::FullSynced(report),
                Ok(None) => StartOutcome::AlreadySynced,
                Err(error) => {
                    warn!(%error, "bootstrap full sync failed, retrying on next tick");
                    StartOutcome::Deferred { error }
                }
            }
        };

        // stop() may have run while the bootstrap was in flight
        if self.cancel.is_cancelled() {
            return Ok(outcome);
        }

        let handle = tokio::spawn(poll_loop(Arc::clone(&self.inner), self.cancel.clone()));
        *self.task.lock() = Some(handle);
        info!(
            interval_ms = self.inner.config.poll_interval.as_millis() as u64,
            "polling started"
        );
        Ok(outcome)
    }

    /// Runs one tick now, outside the cadence.
    ///
    /// Returns [`TickOutcome::Skipped`] if a tick is already running.
    pub async fn tick(&self) -> SyncResult<TickOutcome> {
        self.inner.tick().await
    }

    /// Cancels future ticks and waits for the in-flight one to finish.
    ///
    /// Safe to call more than once and before `start()`.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "polling task ended abnormally");
            }
            info!("polling stopped");
        }
    }

    /// Returns true while the polling task is running.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Gets the current phase.
    pub fn phase(&self) -> SyncPhase {
        self.inner.state.phase()
    }

    /// Gets a copy of the counters.
    pub fn stats(&self) -> SchedulerStats {
        self.inner.stats.read().clone()
    }

    /// Gets the change tracker the delta engine drains.
    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.inner.tracker
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }
}

impl<S: ?Sized, T: ?Sized> Drop for SyncScheduler<S, T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop<S, T>(inner: Arc<SchedulerInner<S, T>>, cancel: CancellationToken)
where
    S: SourceStore + ?Sized + 'static,
    T: TargetStore + ?Sized + 'static,
{
    let period = inner.config.poll_interval;
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("polling loop cancelled");
                break;
            }
            _ = interval.tick() => {
                let tick_inner = Arc::clone(&inner);
                let handle = tokio::spawn(async move { tick_inner.tick().await });
                match handle.await {
                    Ok(Ok(TickOutcome::Skipped)) => {}
                    Ok(Ok(TickOutcome::FullSync(report) | TickOutcome::Delta(report))) => {
                        debug!(pass = %report.kind, attempted = report.attempted, "tick finished");
                    }
                    Ok(Err(e)) => error!(error = %e, "tick failed"),
                    Err(e) => {
                        error!(error = %e, "tick panicked");
                        let mut stats = inner.stats.write();
                        stats.ticks_run += 1;
                        stats.tick_failures += 1;
                        stats.last_error = Some(e.to_string());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::observer::CountingObserver;
    use crate::tracker::ChangeNotifier;
    use recsync_store::{BusinessKey, MemoryStore, Record};
    use std::time::Duration;

    fn config() -> SyncConfig {
        SyncConfig::default()
            .with_batch_size(2)
            .with_poll_interval(Duration::from_secs(10))
            .with_retry(
                RetryConfig::new(2)
                    .with_initial_delay(Duration::ZERO)
                    .with_jitter(false),
            )
    }

    fn stores() -> (Arc<MemoryStore>, Arc<MemoryStore>) {
        let source = Arc::new(MemoryStore::with_unique_key("name"));
        for (name, owner) in [("GE", "test"), ("Exxon", "test2"), ("Google", "test3")] {
            source
                .put(Record::new().with_field("name", name).with_field("owner", owner))
                .unwrap();
        }
        (source, Arc::new(MemoryStore::with_unique_key("name")))
    }

    #[tokio::test]
    async fn start_bootstraps_once() {
        let (source, target) = stores();
        let scheduler = SyncScheduler::builder(config(), source, Arc::clone(&target))
            .build()
            .unwrap();
        assert_eq!(scheduler.phase(), SyncPhase::Unsynced);

        let outcome = scheduler.start().await.unwrap();
        assert!(matches!(outcome, StartOutcome::FullSynced(ref r) if r.succeeded == 3));
        assert_eq!(scheduler.phase(), SyncPhase::Synced);
        assert_eq!(target.len(), 3);
        assert_eq!(scheduler.stats().full_syncs, 1);

        assert!(matches!(
            scheduler.start().await,
            Err(SyncError::AlreadyStarted)
        ));
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn warm_state_skips_bootstrap() {
        let (source, target) = stores();
        let scheduler = SyncScheduler::builder(config(), source, Arc::clone(&target))
            .state(Arc::new(SyncState::synced()))
            .build()
            .unwrap();

        let outcome = scheduler.start().await.unwrap();
        assert!(matches!(outcome, StartOutcome::AlreadySynced));
        assert!(target.is_empty());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn manual_tick_runs_delta() {
        let (source, target) = stores();
        let observer = Arc::new(CountingObserver::new());
        let scheduler = SyncScheduler::builder(config(), Arc::clone(&source), target)
            .observer(observer.clone())
            .build()
            .unwrap();
        scheduler.start().await.unwrap();
        observer.reset();

        let key = BusinessKey::new("GE");
        source.set_field("name", &key, "owner", "test4");
        scheduler.tracker().notify_changed(key);

        let outcome = scheduler.tick().await.unwrap();
        assert!(matches!(outcome, TickOutcome::Delta(ref r) if r.succeeded == 1));
        assert_eq!(observer.count(), 1);
        assert_eq!(scheduler.stats().delta_passes, 1);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn failed_bootstrap_is_deferred() {
        let (source, target) = stores();
        source.close();
        let scheduler = SyncScheduler::builder(config(), source, target)
            .build()
            .unwrap();

        let outcome = scheduler.start().await.unwrap();
        assert!(matches!(outcome, StartOutcome::Deferred { .. }));
        assert_eq!(scheduler.phase(), SyncPhase::Unsynced);

        assert!(scheduler.tick().await.is_err());
        let stats = scheduler.stats();
        assert_eq!(stats.tick_failures, 1);
        assert!(stats.last_error.is_some());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_final() {
        let (source, target) = stores();
        let scheduler = SyncScheduler::builder(config(), source, target)
            .build()
            .unwrap();

        scheduler.stop().await;
        scheduler.stop().await;
        assert!(matches!(scheduler.start().await, Err(SyncError::Stopped)));
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn polling_loop_drains_changes() {
        let (source, target) = stores();
        let scheduler = SyncScheduler::builder(config(), Arc::clone(&source), Arc::clone(&target))
            .build()
            .unwrap();
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());

        let key = BusinessKey::new("Exxon");
        source.set_field("name", &key, "owner", "test5");
        scheduler.tracker().notify_changed(key.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;

        let stored = target.get("name", &key).unwrap();
        assert_eq!(stored.get("owner"), Some(&serde_json::Value::from("test5")));
        assert!(scheduler.tracker().is_empty());
        assert!(scheduler.stats().ticks_run >= 1);

        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[test]
    fn invalid_config_fails_build() {
        let (source, target) = stores();
        let result = SyncScheduler::builder(
            config().with_poll_interval(Duration::ZERO),
            source,
            target,
        )
        .build();
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }
}
