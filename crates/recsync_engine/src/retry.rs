//! Bounded retry with exponential backoff for store calls.

use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};
use recsync_store::StoreResult;
use std::future::Future;
use tracing::{debug, warn};

/// Runs `f` until it succeeds, fails permanently, or exhausts
/// `policy.max_attempts`.
///
/// Only transient store errors are retried. Permanent errors return
/// immediately as [`SyncError::Store`]; exhausting the attempts returns
/// [`SyncError::RetriesExhausted`] carrying the last error.
pub async fn with_retry<F, Fut, T>(policy: &RetryConfig, operation: &str, mut f: F) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(SyncError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last_error: err,
                    });
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient store error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(SyncError::Store(err)),
        }
    }
}
