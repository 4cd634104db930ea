//! In-memory document store for testing.

use crate::error::{StoreError, StoreResult};
use crate::query::{Filter, Patch, Query};
use crate::record::{BusinessKey, Record};
use crate::store::{SourceStore, TargetStore};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory document store.
///
/// This store keeps records in insertion order and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Demos that do not need a real database
///
/// It implements both [`SourceStore`] and [`TargetStore`]; the inherent
/// methods (`put`, `set_field`, `records`, ...) are harness access that the
/// engine never uses.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across tasks.
///
/// # Example
///
/// ```rust
/// use recsync_store::{BusinessKey, MemoryStore, Record};
///
/// let store = MemoryStore::with_unique_key("name");
/// store.put(Record::new().with_field("name", "GE")).unwrap();
/// assert!(store.put(Record::new().with_field("name", "GE")).is_err());
///
/// store.set_field("name", &BusinessKey::new("GE"), "owner", "test4");
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Record>>,
    unique_key: Option<String>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Creates a new empty store without unique constraints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty store that rejects duplicate values of `field`.
    #[must_use]
    pub fn with_unique_key(field: impl Into<String>) -> Self {
        Self {
            unique_key: Some(field.into()),
            ..Self::default()
        }
    }

    /// Inserts a record, stamping `created_at` and `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if the unique field collides and
    /// [`StoreError::Closed`] after [`close`](Self::close).
    pub fn put(&self, mut record: Record) -> StoreResult<Record> {
        self.check_open()?;
        let mut records = self.records.write();

        if let Some(field) = &self.unique_key {
            if let Some(value) = record.get(field) {
                if records.iter().any(|r| r.get(field) == Some(value)) {
                    return Err(StoreError::DuplicateKey {
                        field: field.clone(),
                        key: display_value(value),
                    });
                }
            }
        }

        let now = Utc::now();
        record.created_at = Some(now);
        record.updated_at = Some(now);
        records.push(record.clone());
        Ok(record)
    }

    /// Applies `patch` to every record matching `filter`, bumping
    /// `updated_at`. Returns the number of records matched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`close`](Self::close).
    pub fn modify(&self, filter: &Filter, patch: &Patch) -> StoreResult<u64> {
        self.check_open()?;
        let now = Utc::now();
        let mut matched = 0;

        for record in self.records.write().iter_mut().filter(|r| filter.matches(r)) {
            patch.apply(record);
            record.updated_at = Some(now);
            matched += 1;
        }

        Ok(matched)
    }

    /// Sets one field on the record keyed `key`. Returns false if no record
    /// carries that key.
    pub fn set_field(
        &self,
        key_field: &str,
        key: &BusinessKey,
        field: &str,
        value: impl Into<Value>,
    ) -> bool {
        let patch = Patch::new().with(field, value);
        matches!(self.modify(&Filter::key(key_field, key), &patch), Ok(n) if n > 0)
    }

    /// Returns the record keyed `key`, if present.
    #[must_use]
    pub fn get(&self, key_field: &str, key: &BusinessKey) -> Option<Record> {
        let filter = Filter::key(key_field, key);
        self.records.read().iter().find(|r| filter.matches(r)).cloned()
    }

    /// Returns the business keys of all records, in insertion order.
    #[must_use]
    pub fn keys(&self, key_field: &str) -> Vec<BusinessKey> {
        self.records
            .read()
            .iter()
            .filter_map(|r| r.business_key(key_field))
            .collect()
    }

    /// Returns a copy of all records.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Removes all records.
    pub fn clear(&self) {
        self.records.write().clear();
    }

    /// Makes every further operation fail with [`StoreError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn select(&self, query: &Query) -> Vec<Record> {
        let skip = query.skip.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |n| n as usize);

        self.records
            .read()
            .iter()
            .filter(|r| query.filter.matches(r))
            .skip(skip)
            .take(limit)
            .cloned()
            .collect()
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn find(&self, query: &Query) -> StoreResult<Vec<Record>> {
        self.check_open()?;
        Ok(self.select(query))
    }

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Record>> {
        self.check_open()?;
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| filter.matches(r))
            .cloned())
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        self.check_open()?;
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| filter.matches(r))
            .count() as u64)
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn insert(&self, record: Record) -> StoreResult<Record> {
        self.put(record)
    }

    async fn update(&self, filter: &Filter, patch: &Patch) -> StoreResult<u64> {
        self.modify(filter, patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn company(name: &str) -> Record {
        Record::new().with_field("name", name).with_field("owner", "test")
    }

    fn seeded(n: usize) -> MemoryStore {
        let store = MemoryStore::with_unique_key("name");
        for i in 0..n {
            store.put(company(&format!("company-{i:02}"))).unwrap();
        }
        store
    }

    #[test]
    fn memory_new_is_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn put_stamps_timestamps() {
        let store = MemoryStore::new();
        let stored = store.put(company("GE")).unwrap();
        assert!(stored.created_at.is_some());
        assert_eq!(stored.created_at, stored.updated_at);
    }

    #[test]
    fn unique_key_rejects_duplicates() {
        let store = MemoryStore::with_unique_key("name");
        store.put(company("GE")).unwrap();

        let result = store.put(company("GE"));
        assert!(matches!(result, Err(StoreError::DuplicateKey { .. })));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn without_unique_key_duplicates_are_allowed() {
        let store = MemoryStore::new();
        store.put(company("GE")).unwrap();
        store.put(company("GE")).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn modify_bumps_updated_at_and_counts_matches() {
        let store = MemoryStore::new();
        let before = store.put(company("GE")).unwrap();
        store.put(company("Exxon")).unwrap();

        let patch = Patch::new().with("owner", "test4");
        let matched = store
            .modify(&Filter::key("name", &BusinessKey::new("GE")), &patch)
            .unwrap();
        assert_eq!(matched, 1);

        let after = store.get("name", &BusinessKey::new("GE")).unwrap();
        assert_eq!(after.get("owner"), Some(&Value::from("test4")));
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn set_field_reports_missing_key() {
        let store = seeded(2);
        assert!(store.set_field("name", &BusinessKey::new("company-00"), "owner", "x"));
        assert!(!store.set_field("name", &BusinessKey::new("nope"), "owner", "x"));
    }

    #[test]
    fn keys_in_insertion_order() {
        let store = seeded(3);
        let keys: Vec<String> = store.keys("name").iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["company-00", "company-01", "company-02"]);
    }

    proptest! {
        #[test]
        fn pages_cover_every_record_once(n in 0usize..60, batch in 1u64..20) {
            let store = seeded(n);
            let mut seen = Vec::new();
            let mut offset = 0;
            while offset < n as u64 {
                let page = store.select(&Query::all().skip(offset).limit(batch));
                prop_assert!(page.len() as u64 <= batch);
                seen.extend(page.iter().filter_map(|r| r.business_key("name")));
                offset += batch;
            }
            prop_assert_eq!(seen, store.keys("name"));
        }
    }

    #[tokio::test]
    async fn find_paginates_in_insertion_order() {
        let store = seeded(13);

        let page = store.find(&Query::all().skip(10).limit(5)).await.unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].business_key("name").unwrap().as_str(), "company-10");

        let past_end = store.find(&Query::all().skip(20).limit(5)).await.unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn find_one_and_count() {
        let store = seeded(4);
        let key = BusinessKey::new("company-02");

        let found = store.find_one(&Filter::key("name", &key)).await.unwrap();
        assert_eq!(found.unwrap().business_key("name"), Some(key));

        assert_eq!(store.count(&Filter::All).await.unwrap(), 4);
        let missing = Filter::key("name", &BusinessKey::new("nope"));
        assert_eq!(store.count(&missing).await.unwrap(), 0);
        assert!(store.find_one(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn target_update_reports_zero_for_missing() {
        let store = MemoryStore::new();
        let patch = Patch::from_record(&company("GE"));
        let matched = TargetStore::update(
            &store,
            &Filter::key("name", &BusinessKey::new("GE")),
            &patch,
        )
        .await
        .unwrap();
        assert_eq!(matched, 0);
    }

    #[tokio::test]
    async fn closed_store_fails() {
        let store = seeded(1);
        store.close();

        assert!(matches!(
            store.find(&Query::all()).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(
            TargetStore::insert(&store, company("GE")).await,
            Err(StoreError::Closed)
        ));
    }
}
