//! Source and target store capabilities.

use crate::error::StoreResult;
use crate::query::{Filter, Patch, Query};
use crate::record::Record;
use async_trait::async_trait;
use std::sync::Arc;

/// Read-only access to the store records are synchronized from.
///
/// # Invariants
///
/// - `find` returns records in a stable natural order, so consecutive
///   `skip`/`limit` pages neither overlap nor leave gaps while the store is
///   unchanged
/// - No method mutates the store
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For testing
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Returns the records selected by `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    async fn find(&self, query: &Query) -> StoreResult<Vec<Record>>;

    /// Returns the first record matching `filter`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Record>>;

    /// Returns the number of records matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    async fn count(&self, filter: &Filter) -> StoreResult<u64>;
}

/// Write-only access to the store records are synchronized into.
///
/// Nothing is ever read back from the target for verification.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Inserts a new record and returns it as stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`](crate::StoreError::DuplicateKey)
    /// if a unique field collides, or any transport error.
    async fn insert(&self, record: Record) -> StoreResult<Record>;

    /// Applies `patch` to every record matching `filter`.
    ///
    /// Returns the number of records matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    async fn update(&self, filter: &Filter, patch: &Patch) -> StoreResult<u64>;
}

#[async_trait]
impl<S: SourceStore + ?Sized> SourceStore for Arc<S> {
    async fn find(&self, query: &Query) -> StoreResult<Vec<Record>> {
        (**self).find(query).await
    }

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Record>> {
        (**self).find_one(filter).await
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        (**self).count(filter).await
    }
}

#[async_trait]
impl<T: TargetStore + ?Sized> TargetStore for Arc<T> {
    async fn insert(&self, record: Record) -> StoreResult<Record> {
        (**self).insert(record).await
    }

    async fn update(&self, filter: &Filter, patch: &Patch) -> StoreResult<u64> {
        (**self).update(filter, patch).await
    }
}
