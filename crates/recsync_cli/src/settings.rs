//! Configuration loading: JSON file, then command-line overrides.

use recsync_engine::SyncConfig;
use std::path::Path;
use std::time::Duration;

/// Values given on the command line. They win over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub batch_size: Option<u64>,
    pub interval_ms: Option<u64>,
}

/// Loads the configuration from `path` (defaults if `None`), applies the
/// overrides and validates the result.
pub fn load(
    path: Option<&Path>,
    overrides: &Overrides,
) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {e}", path.display()))?;
            serde_json::from_str::<SyncConfig>(&text)
                .map_err(|e| format!("Invalid config {}: {e}", path.display()))?
        }
        None => SyncConfig::default(),
    };

    if let Some(batch_size) = overrides.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(ms) = overrides.interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }

    config.validate()?;
    Ok(config)
}
