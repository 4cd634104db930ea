//! Demo command implementation.

use super::{empty_target, mutate_random, seed_source};
use recsync_engine::{
    ChangeNotifier, CountingObserver, StartOutcome, SyncConfig, SyncScheduler, TickOutcome,
};
use std::sync::Arc;

/// Runs the demo command.
pub async fn run(
    config: SyncConfig,
    records: usize,
    touch: usize,
    ticks: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let key_field = config.key_field.clone();
    let source = seed_source(&key_field, records)?;
    let target = empty_target(&key_field);
    let observer = Arc::new(CountingObserver::new());

    let scheduler = SyncScheduler::builder(config, Arc::clone(&source), Arc::clone(&target))
        .observer(observer.clone())
        .build()?;

    match scheduler.start().await? {
        StartOutcome::FullSynced(report) => println!("bootstrap  {report}"),
        StartOutcome::AlreadySynced => println!("bootstrap  skipped (already synced)"),
        StartOutcome::Deferred { error } => println!("bootstrap  deferred: {error}"),
    }
    println!("target now holds {} of {} records", target.len(), source.len());

    let mut touched = 0;
    for _ in 0..touch {
        if let Some(key) = mutate_random(&source, &key_field) {
            scheduler.tracker().notify_changed(key);
            touched += 1;
        }
    }
    println!(
        "touched {touched} records ({} distinct keys pending)",
        scheduler.tracker().pending_keys().len()
    );

    observer.reset();
    for i in 1..=ticks {
        match scheduler.tick().await {
            Ok(TickOutcome::FullSync(report)) | Ok(TickOutcome::Delta(report)) => {
                println!("tick {i:<5} {report}");
                for failed in &report.failed_keys {
                    println!("  failed {:?}: {}", failed.key, failed.error);
                }
            }
            Ok(TickOutcome::Skipped) => println!("tick {i:<5} skipped"),
            Err(e) => println!("tick {i:<5} failed: {e}"),
        }
    }

    println!("events sent: {}", observer.count());
    println!("still pending: {}", scheduler.tracker().pending_len());
    scheduler.stop().await;
    Ok(())
}
