//! Bounded retry with exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::config::SyncConfig;
use crate::error::{CalSyncResult, SyncError};

/// Run `op` with a per-attempt timeout, retrying transient failures with
/// exponential backoff up to `config.max_retries` extra attempts.
///
/// Auth and validation errors abort immediately: retrying them cannot
/// succeed without user action.
pub async fn with_retry<T, F, Fut>(config: &SyncConfig, op_name: &str, mut op: F) -> CalSyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CalSyncResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        let result = match timeout(config.provider_timeout(), op()).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::ProviderTimeout(config.provider_timeout_secs)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                let delay = backoff_delay(config.retry_base_delay(), attempt);
                warn!(
                    op = op_name,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient provider failure, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
}
