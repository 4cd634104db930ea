//! Full command implementation.

use super::{empty_target, seed_source};
use crate::Format;
use recsync_engine::{FullSyncEngine, FullSyncMode, SyncConfig};
use std::sync::Arc;

/// Runs the full command.
pub async fn run(
    config: SyncConfig,
    mode: FullSyncMode,
    records: usize,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = seed_source(&config.key_field, records)?;
    let target = empty_target(&config.key_field);
    let engine = FullSyncEngine::new(config, source, Arc::clone(&target))?;

    let report = engine.run(mode).await?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => {
            println!("{report}");
            println!("target now holds {} records", target.len());
            for failed in &report.failed_keys {
                println!("  failed {:?}: {}", failed.key, failed.error);
            }
            for page in &report.failed_pages {
                println!(
                    "  lost page offset={} limit={}: {}",
                    page.offset, page.limit, page.error
                );
            }
        }
    }

    Ok(())
}
