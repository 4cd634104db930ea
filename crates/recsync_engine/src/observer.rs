//! Post-upsert observer hook.
//!
//! Observers see every record the engines upsert. They run after the write
//! and outside the engines' control flow: an observer that errors or panics
//! is logged and ignored.

use crate::report::{PassKind, Upserted};
use recsync_store::{BusinessKey, Record};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Result type for observer callbacks.
pub type ObserverResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// One successful upsert.
#[derive(Debug, Clone, Copy)]
pub struct UpsertEvent<'a> {
    /// Engine that performed the write.
    pub kind: PassKind,
    /// Key of the record.
    pub key: &'a BusinessKey,
    /// Insert or update.
    pub outcome: Upserted,
    /// The record as read from source.
    pub record: &'a Record,
}

/// Receives a callback per upserted record, e.g. for downstream events or
/// metrics.
pub trait SyncObserver: Send + Sync {
    /// Called once per record after it lands in the target.
    fn record_upserted(&self, event: &UpsertEvent<'_>) -> ObserverResult;
}

/// Observer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn record_upserted(&self, _event: &UpsertEvent<'_>) -> ObserverResult {
        Ok(())
    }
}

/// Observer that logs every upserted record at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn record_upserted(&self, event: &UpsertEvent<'_>) -> ObserverResult {
        info!(
            pass = %event.kind,
            key = %event.key,
            outcome = ?event.outcome,
            fields = event.record.fields.len(),
            "event sent"
        );
        Ok(())
    }
}

/// Observer that counts events.
#[derive(Debug, Default)]
pub struct CountingObserver {
    events: AtomicU64,
}

impl CountingObserver {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events seen since creation or the last reset.
    pub fn count(&self) -> u64 {
        self.events.load(Ordering::SeqCst)
    }

    /// Sets the counter back to zero.
    pub fn reset(&self) {
        self.events.store(0, Ordering::SeqCst);
    }
}

impl SyncObserver for CountingObserver {
    fn record_upserted(&self, _event: &UpsertEvent<'_>) -> ObserverResult {
        self.events.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Invokes `observer`, swallowing its errors and panics.
pub(crate) fn notify(observer: &dyn SyncObserver, event: &UpsertEvent<'_>) {
    match catch_unwind(AssertUnwindSafe(|| observer.record_upserted(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(key = %event.key, error = %e, "observer failed"),
        Err(_) => warn!(key = %event.key, "observer panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingObserver;

    impl SyncObserver for FailingObserver {
        fn record_upserted(&self, _event: &UpsertEvent<'_>) -> ObserverResult {
            Err("downstream unavailable".into())
        }
    }

    struct PanickingObserver;

    impl SyncObserver for PanickingObserver {
        fn record_upserted(&self, _event: &UpsertEvent<'_>) -> ObserverResult {
            panic!("observer bug")
        }
    }

    fn with_event<R>(f: impl FnOnce(&UpsertEvent<'_>) -> R) -> R {
        let key = BusinessKey::new("GE");
        let record = Record::new().with_field("name", "GE");
        let event = UpsertEvent {
            kind: PassKind::Delta,
            key: &key,
            outcome: Upserted::Updated,
            record: &record,
        };
        f(&event)
    }

    #[test]
    fn counting_observer_counts() {
        let observer = CountingObserver::new();
        with_event(|event| {
            notify(&observer, event);
            notify(&observer, event);
        });
        assert_eq!(observer.count(), 2);

        observer.reset();
        assert_eq!(observer.count(), 0);
    }

    #[test]
    fn failing_observer_is_swallowed() {
        with_event(|event| notify(&FailingObserver, event));
    }

    #[test]
    fn panicking_observer_is_swallowed() {
        with_event(|event| notify(&PanickingObserver, event));
    }

    #[test]
    fn builtin_observers_succeed() {
        with_event(|event| {
            assert!(NoopObserver.record_upserted(event).is_ok());
            assert!(TracingObserver.record_upserted(event).is_ok());
        });
    }
}
