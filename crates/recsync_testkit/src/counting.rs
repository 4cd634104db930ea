//! Store wrapper that counts every call.

use async_trait::async_trait;
use recsync_store::{Filter, Patch, Query, Record, SourceStore, StoreResult, TargetStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of the calls a [`CountingStore`] has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `find` calls.
    pub find: u64,
    /// `find_one` calls.
    pub find_one: u64,
    /// `count` calls.
    pub count: u64,
    /// `insert` calls.
    pub insert: u64,
    /// `update` calls.
    pub update: u64,
}

impl CallCounts {
    /// Source-side calls.
    pub fn reads(&self) -> u64 {
        self.find + self.find_one + self.count
    }

    /// Target-side calls.
    pub fn writes(&self) -> u64 {
        self.insert + self.update
    }

    /// All calls.
    pub fn total(&self) -> u64 {
        self.reads() + self.writes()
    }
}

#[derive(Debug, Default)]
struct Counters {
    find: AtomicU64,
    find_one: AtomicU64,
    count: AtomicU64,
    insert: AtomicU64,
    update: AtomicU64,
}

/// Wraps a store and counts calls per operation.
pub struct CountingStore<S: ?Sized> {
    inner: Arc<S>,
    counters: Counters,
}

impl<S: ?Sized> CountingStore<S> {
    /// Wraps `inner`.
    pub fn new(inner: Arc<S>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            counters: Counters::default(),
        })
    }

    /// Gets the wrapped store.
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    /// Returns the counts so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            find: self.counters.find.load(Ordering::SeqCst),
            find_one: self.counters.find_one.load(Ordering::SeqCst),
            count: self.counters.count.load(Ordering::SeqCst),
            insert: self.counters.insert.load(Ordering::SeqCst),
            update: self.counters.update.load(Ordering::SeqCst),
        }
    }

    /// Sets every counter back to zero.
    pub fn reset(&self) {
        for counter in [
            &self.counters.find,
            &self.counters.find_one,
            &self.counters.count,
            &self.counters.insert,
            &self.counters.update,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl<S: SourceStore + ?Sized> SourceStore for CountingStore<S> {
    async fn find(&self, query: &Query) -> StoreResult<Vec<Record>> {
        self.counters.find.fetch_add(1, Ordering::SeqCst);
        self.inner.find(query).await
    }

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Record>> {
        self.counters.find_one.fetch_add(1, Ordering::SeqCst);
        self.inner.find_one(filter).await
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        self.counters.count.fetch_add(1, Ordering::SeqCst);
        self.inner.count(filter).await
    }
}

#[async_trait]
impl<S: TargetStore + ?Sized> TargetStore for CountingStore<S> {
    async fn insert(&self, record: Record) -> StoreResult<Record> {
        self.counters.insert.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(record).await
    }

    async fn update(&self, filter: &Filter, patch: &Patch) -> StoreResult<u64> {
        self.counters.update.fetch_add(1, Ordering::SeqCst);
        self.inner.update(filter, patch).await
    }
}
