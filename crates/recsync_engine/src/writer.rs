//! Upsert-by-business-key against a write-only target.
//!
//! The target offers only `insert` and `update`, so an upsert is an update
//! keyed on the business key, falling back to an insert when nothing
//! matched. An insert that collides with a concurrent writer's insert turns
//! back into an update.

use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};
use crate::observer::{notify, SyncObserver, UpsertEvent};
use crate::report::{PassKind, SyncReport, Upserted};
use crate::retry::with_retry;
use futures::stream::{self, StreamExt};
use recsync_store::{BusinessKey, Filter, Patch, Record, StoreError, TargetStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of writing one record.
#[derive(Debug)]
pub(crate) enum WriteOutcome {
    Written(Upserted),
    Failed {
        key: Option<BusinessKey>,
        error: SyncError,
    },
}

impl WriteOutcome {
    pub(crate) fn apply_to(self, report: &mut SyncReport) {
        match self {
            WriteOutcome::Written(outcome) => report.record_success(outcome),
            WriteOutcome::Failed { key, error } => report.record_failure(key, error),
        }
    }
}

/// Upserts records into the target and notifies the observer.
pub(crate) struct RecordWriter<T: ?Sized> {
    target: Arc<T>,
    key_field: String,
    retry: RetryConfig,
    observer: Arc<dyn SyncObserver>,
}

impl<T: TargetStore + ?Sized> RecordWriter<T> {
    pub(crate) fn new(
        target: Arc<T>,
        key_field: String,
        retry: RetryConfig,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        Self {
            target,
            key_field,
            retry,
            observer,
        }
    }

    pub(crate) fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub(crate) fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Upserts one record read from source.
    pub(crate) async fn write(&self, kind: PassKind, record: &Record) -> WriteOutcome {
        let Some(key) = record.business_key(&self.key_field) else {
            warn!(field = %self.key_field, "record without business key skipped");
            return WriteOutcome::Failed {
                key: None,
                error: SyncError::MissingKey {
                    field: self.key_field.clone(),
                },
            };
        };

        match self.upsert(&key, record).await {
            Ok(outcome) => {
                debug!(%key, ?outcome, "record upserted");
                notify(
                    self.observer.as_ref(),
                    &UpsertEvent {
                        kind,
                        key: &key,
                        outcome,
                        record,
                    },
                );
                WriteOutcome::Written(outcome)
            }
            Err(error) => {
                warn!(%key, %error, "upsert failed");
                WriteOutcome::Failed {
                    key: Some(key),
                    error,
                }
            }
        }
    }

    /// Upserts a page with at most `concurrency` writes in flight and folds
    /// the outcomes into `report`.
    pub(crate) async fn write_all(
        &self,
        kind: PassKind,
        records: Vec<Record>,
        concurrency: usize,
        report: &mut SyncReport,
    ) {
        let outcomes: Vec<WriteOutcome> = stream::iter(records)
            .map(|record| async move { self.write(kind, &record).await })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            outcome.apply_to(report);
        }
    }

    async fn upsert(&self, key: &BusinessKey, record: &Record) -> SyncResult<Upserted> {
        let filter = Filter::key(&self.key_field, key);
        let patch = Patch::from_record(record);
        let operation = format!("upsert {key}");

        let matched = with_retry(&self.retry, &operation, || {
            self.target.update(&filter, &patch)
        })
        .await?;
        if matched > 0 {
            return Ok(Upserted::Updated);
        }

        let fresh = Record {
            fields: record.fields.clone(),
            ..Record::default()
        };
        match with_retry(&self.retry, &operation, || self.target.insert(fresh.clone())).await {
            Ok(_) => Ok(Upserted::Inserted),
            Err(SyncError::Store(StoreError::DuplicateKey { .. })) => {
                debug!(%key, "insert raced with another writer, updating instead");
                with_retry(&self.retry, &operation, || {
                    self.target.update(&filter, &patch)
                })
                .await?;
                Ok(Upserted::Updated)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{CountingObserver, NoopObserver};
    use recsync_store::MemoryStore;
    use std::time::Duration;

    fn writer(target: Arc<MemoryStore>, observer: Arc<dyn SyncObserver>) -> RecordWriter<MemoryStore> {
        let retry = RetryConfig::new(3)
            .with_initial_delay(Duration::ZERO)
            .with_jitter(false);
        RecordWriter::new(target, "name".into(), retry, observer)
    }

    fn company(name: &str, owner: &str) -> Record {
        Record::new().with_field("name", name).with_field("owner", owner)
    }

    #[tokio::test]
    async fn inserts_then_updates() {
        let target = Arc::new(MemoryStore::with_unique_key("name"));
        let w = writer(Arc::clone(&target), Arc::new(NoopObserver));

        let first = w.write(PassKind::FullNaive, &company("GE", "test")).await;
        assert!(matches!(first, WriteOutcome::Written(Upserted::Inserted)));

        let second = w.write(PassKind::Delta, &company("GE", "test4")).await;
        assert!(matches!(second, WriteOutcome::Written(Upserted::Updated)));

        assert_eq!(target.len(), 1);
        let stored = target.get("name", &BusinessKey::new("GE")).unwrap();
        assert_eq!(stored.get("owner"), Some(&serde_json::Value::from("test4")));
    }

    #[tokio::test]
    async fn numeric_keys_are_upserted_in_place() {
        let target = Arc::new(MemoryStore::with_unique_key("id"));
        let w = RecordWriter::new(
            Arc::clone(&target),
            "id".into(),
            RetryConfig::no_retry(),
            Arc::new(NoopObserver) as Arc<dyn SyncObserver>,
        );
        let part = |qty: i64| Record::new().with_field("id", 1001).with_field("qty", qty);

        let first = w.write(PassKind::FullNaive, &part(5)).await;
        assert!(matches!(first, WriteOutcome::Written(Upserted::Inserted)));
        let second = w.write(PassKind::Delta, &part(9)).await;
        assert!(matches!(second, WriteOutcome::Written(Upserted::Updated)));

        assert_eq!(target.len(), 1);
        let stored = target.get("id", &BusinessKey::number(1001)).unwrap();
        assert_eq!(stored.get("qty"), Some(&serde_json::Value::from(9)));
    }

    #[tokio::test]
    async fn missing_key_is_a_failure() {
        let target = Arc::new(MemoryStore::new());
        let w = writer(Arc::clone(&target), Arc::new(NoopObserver));

        let outcome = w
            .write(PassKind::FullNaive, &Record::new().with_field("owner", "x"))
            .await;
        assert!(matches!(
            outcome,
            WriteOutcome::Failed {
                key: None,
                error: SyncError::MissingKey { .. }
            }
        ));
        assert!(target.is_empty());
    }

    #[tokio::test]
    async fn observer_sees_each_success() {
        let target = Arc::new(MemoryStore::new());
        let observer = Arc::new(CountingObserver::new());
        let w = writer(target, observer.clone());

        let records = vec![
            company("GE", "test"),
            company("Exxon", "test2"),
            Record::new(),
        ];
        let mut report = SyncReport::new(PassKind::FullNaive);
        w.write_all(PassKind::FullNaive, records, 2, &mut report).await;

        assert_eq!(observer.count(), 2);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
    }
}
