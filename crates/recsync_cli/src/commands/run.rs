//! Run command implementation.

use super::{empty_target, mutate_random, seed_source};
use recsync_engine::{ChangeNotifier, SyncConfig, SyncScheduler, TracingObserver};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Runs the run command.
pub async fn run(
    config: SyncConfig,
    records: usize,
    seconds: Option<u64>,
    touch_every_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let key_field = config.key_field.clone();
    let source = seed_source(&key_field, records)?;
    let target = empty_target(&key_field);

    let scheduler = SyncScheduler::builder(config, Arc::clone(&source), Arc::clone(&target))
        .observer(Arc::new(TracingObserver))
        .build()?;
    scheduler.start().await?;

    let deadline = async {
        match seconds {
            Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut touches = tokio::time::interval(Duration::from_millis(touch_every_ms.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = &mut deadline => break,
            _ = touches.tick() => {
                if let Some(key) = mutate_random(&source, &key_field) {
                    scheduler.tracker().notify_changed(key);
                }
            }
        }
    }

    scheduler.stop().await;

    let stats = scheduler.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    println!(
        "target holds {} of {} records, {} changes pending",
        target.len(),
        source.len(),
        scheduler.tracker().pending_len()
    );
    Ok(())
}
