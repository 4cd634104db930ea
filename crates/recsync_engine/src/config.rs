//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the scheduler performs the bootstrap full sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullSyncMode {
    /// One query for the whole source, then upsert everything.
    Naive,
    /// Bounded pages of `batch_size` records.
    #[default]
    Paginated,
}

/// Configuration for sync operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Field that holds the business key.
    pub key_field: String,
    /// Page size for paginated full sync.
    pub batch_size: u64,
    /// Cadence between delta ticks.
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
    /// Bootstrap full sync strategy.
    pub full_sync_mode: FullSyncMode,
    /// Maximum upserts in flight within one page or delta pass.
    pub upsert_concurrency: usize,
    /// Retry configuration for store calls.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration keyed on `key_field` with default settings.
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            batch_size: 100,
            poll_interval: Duration::from_secs(10),
            full_sync_mode: FullSyncMode::Paginated,
            upsert_concurrency: 4,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the page size for paginated full sync.
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the delta polling cadence.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the bootstrap full sync strategy.
    pub fn with_full_sync_mode(mut self, mode: FullSyncMode) -> Self {
        self.full_sync_mode = mode;
        self
    }

    /// Sets how many upserts may be in flight at once.
    pub fn with_upsert_concurrency(mut self, concurrency: usize) -> Self {
        self.upsert_concurrency = concurrency;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Checks every setting, failing on the first invalid one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] describing the offending field.
    pub fn validate(&self) -> SyncResult<()> {
        if self.key_field.is_empty() {
            return Err(SyncError::invalid_config("key_field must not be empty"));
        }
        validate_batch_size(self.batch_size)?;
        if self.poll_interval.is_zero() {
            return Err(SyncError::invalid_config("poll_interval must be positive"));
        }
        if self.upsert_concurrency == 0 {
            return Err(SyncError::invalid_config(
                "upsert_concurrency must be at least 1",
            ));
        }
        self.retry.validate()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("name")
    }
}

pub(crate) fn validate_batch_size(batch_size: u64) -> SyncResult<()> {
    if batch_size == 0 {
        Err(SyncError::invalid_config("batch_size must be at least 1"))
    } else {
        Ok(())
    }
}

/// Configuration for retry behavior.
///
/// The default allows four attempts: the first try plus three retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(rename = "initial_delay_ms", with = "millis")]
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% on top
            let jitter = delay_secs * 0.25 * rand::random::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }

    fn validate(&self) -> SyncResult<()> {
        if self.max_attempts == 0 {
            return Err(SyncError::invalid_config(
                "retry.max_attempts must be at least 1",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(SyncError::invalid_config(
                "retry.backoff_multiplier must be a finite value >= 1.0",
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(4)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
