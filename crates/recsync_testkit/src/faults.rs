//! Fault injection.
//!
//! [`FlakyStore`] fails calls on demand, either the next N calls or every
//! call touching given business keys. [`GatedSource`] parks `find_one`
//! calls until the test lets them through, which makes it possible to act
//! while a delta pass is mid-flight.

use async_trait::async_trait;
use parking_lot::RwLock;
use recsync_store::{
    BusinessKey, Filter, Patch, Query, Record, SourceStore, StoreError, StoreResult, TargetStore,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// Wraps a store and injects errors.
pub struct FlakyStore<S: ?Sized> {
    inner: Arc<S>,
    key_field: String,
    error: StoreError,
    fail_next: AtomicU32,
    fail_finds: AtomicU32,
    failing_keys: RwLock<HashSet<BusinessKey>>,
    injected: AtomicU32,
}

impl<S: ?Sized> FlakyStore<S> {
    /// Wraps `inner`. Injected failures are [`StoreError::Timeout`] until
    /// [`with_error`](Self::with_error) says otherwise.
    pub fn new(inner: Arc<S>, key_field: impl Into<String>) -> Self {
        Self {
            inner,
            key_field: key_field.into(),
            error: StoreError::Timeout,
            fail_next: AtomicU32::new(0),
            fail_finds: AtomicU32::new(0),
            failing_keys: RwLock::new(HashSet::new()),
            injected: AtomicU32::new(0),
        }
    }

    /// Sets the error every injected failure returns.
    pub fn with_error(mut self, error: StoreError) -> Self {
        self.error = error;
        self
    }

    /// Fails the next `n` calls of any kind.
    pub fn fail_next_calls(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fails the next `n` `find` calls only, e.g. to lose a page while the
    /// initial count succeeds.
    pub fn fail_next_finds(&self, n: u32) {
        self.fail_finds.store(n, Ordering::SeqCst);
    }

    /// Fails every call that reads or writes `key`.
    pub fn fail_key(&self, key: impl Into<BusinessKey>) {
        self.failing_keys.write().insert(key.into());
    }

    /// Stops failing calls for `key`.
    pub fn heal_key(&self, key: &BusinessKey) {
        self.failing_keys.write().remove(key);
    }

    /// Stops injecting failures altogether.
    pub fn heal(&self) {
        self.fail_next.store(0, Ordering::SeqCst);
        self.fail_finds.store(0, Ordering::SeqCst);
        self.failing_keys.write().clear();
    }

    /// Number of failures injected so far.
    pub fn injected(&self) -> u32 {
        self.injected.load(Ordering::SeqCst)
    }

    fn check(&self, key: Option<BusinessKey>) -> StoreResult<()> {
        let take_one = take(&self.fail_next);
        let key_fails = key.is_some_and(|k| self.failing_keys.read().contains(&k));
        self.inject_if(take_one || key_fails)
    }

    fn inject_if(&self, fail: bool) -> StoreResult<()> {
        if fail {
            self.injected.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        } else {
            Ok(())
        }
    }

    fn filter_key(&self, filter: &Filter) -> Option<BusinessKey> {
        match filter {
            Filter::Eq { field, value } if *field == self.key_field => {
                BusinessKey::from_value(value)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl<S: SourceStore + ?Sized> SourceStore for FlakyStore<S> {
    async fn find(&self, query: &Query) -> StoreResult<Vec<Record>> {
        self.check(None)?;
        self.inject_if(take(&self.fail_finds))?;
        self.inner.find(query).await
    }

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Record>> {
        self.check(self.filter_key(filter))?;
        self.inner.find_one(filter).await
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        self.check(None)?;
        self.inner.count(filter).await
    }
}

#[async_trait]
impl<S: TargetStore + ?Sized> TargetStore for FlakyStore<S> {
    async fn insert(&self, record: Record) -> StoreResult<Record> {
        self.check(record.business_key(&self.key_field))?;
        self.inner.insert(record).await
    }

    async fn update(&self, filter: &Filter, patch: &Patch) -> StoreResult<u64> {
        self.check(self.filter_key(filter))?;
        self.inner.update(filter, patch).await
    }
}

fn take(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Wraps a source and holds every `find_one` until released.
///
/// Other calls pass straight through.
pub struct GatedSource<S: ?Sized> {
    inner: Arc<S>,
    gate: Semaphore,
    parked: AtomicUsize,
    arrived: Notify,
}

impl<S: ?Sized> GatedSource<S> {
    /// Wraps `inner` with the gate closed.
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            parked: AtomicUsize::new(0),
            arrived: Notify::new(),
        }
    }

    /// Number of `find_one` calls that have reached the gate.
    pub fn parked(&self) -> usize {
        self.parked.load(Ordering::SeqCst)
    }

    /// Waits until at least `n` calls have reached the gate.
    pub async fn wait_for_parked(&self, n: usize) {
        while self.parked() < n {
            self.arrived.notified().await;
        }
    }

    /// Lets `n` parked or future calls through.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Opens the gate for good.
    pub fn open(&self) {
        self.gate.close();
    }
}

#[async_trait]
impl<S: SourceStore + ?Sized> SourceStore for GatedSource<S> {
    async fn find(&self, query: &Query) -> StoreResult<Vec<Record>> {
        self.inner.find(query).await
    }

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Record>> {
        self.parked.fetch_add(1, Ordering::SeqCst);
        self.arrived.notify_one();
        // a closed semaphore means the gate is open
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.inner.find_one(filter).await
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        self.inner.count(filter).await
    }
}
