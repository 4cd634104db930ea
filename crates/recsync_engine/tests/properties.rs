//! Property tests for the sync engines.

use proptest::prelude::*;
use recsync_engine::{
    ChangeNotifier, ChangeTracker, DeltaSyncEngine, FullSyncEngine, RetryConfig, SyncConfig,
};
use recsync_store::Record;
use recsync_testkit::prelude::*;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

fn block_on<F: Future>(f: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
        .block_on(f)
}

fn config() -> SyncConfig {
    SyncConfig::new(KEY_FIELD).with_retry(RetryConfig::no_retry())
}

fn store_of(records: &[Record]) -> Arc<recsync_store::MemoryStore> {
    let store = empty_store();
    for record in records {
        store.put(record.clone()).expect("Failed to seed record");
    }
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn paginated_copy_is_complete(
        records in companies_strategy(60),
        batch_size in batch_size_strategy(),
    ) {
        let source = store_of(&records);
        let target = empty_store();
        let engine = FullSyncEngine::new(config(), Arc::clone(&source), Arc::clone(&target))
            .expect("Failed to build engine");

        let report = block_on(engine.sync_all_safely(batch_size)).expect("Full sync failed");

        let n = records.len() as u64;
        prop_assert_eq!(report.pages.len() as u64, n.div_ceil(batch_size));
        prop_assert_eq!(report.succeeded, n);
        prop_assert_eq!(target.len(), records.len());
        prop_assert!(converged(&source, &target));
    }

    #[test]
    fn delta_upserts_each_touched_key_once(
        records in companies_strategy(30).prop_filter("need records", |r| !r.is_empty()),
        touches in touches_strategy(30, 80),
    ) {
        let source = store_of(&records);
        let target = empty_store();
        let tracker = Arc::new(ChangeTracker::new());
        let engine = DeltaSyncEngine::new(
            config(),
            Arc::clone(&source),
            Arc::clone(&target),
            Arc::clone(&tracker),
        )
        .expect("Failed to build engine");

        let mut touched = BTreeSet::new();
        for i in touches {
            let record = &records[i % records.len()];
            let key = record.business_key(KEY_FIELD).expect("fixture has a key");
            touched.insert(key.clone());
            tracker.notify_changed(key);
        }

        let report = block_on(engine.sync_new_changes()).expect("Delta pass failed");

        prop_assert_eq!(report.attempted, touched.len() as u64);
        prop_assert_eq!(report.succeeded, touched.len() as u64);
        prop_assert_eq!(target.len(), touched.len());
        prop_assert!(tracker.is_empty());
    }
}
