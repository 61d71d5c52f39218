//! Bounded retry for transient object-store failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use depot_core::defaults::{STORE_RETRY_ATTEMPTS, STORE_RETRY_BASE_MS};
use depot_core::{Error, Result};

/// Run `op`, retrying only `Error::Transient` with exponential backoff.
///
/// Non-transient errors surface immediately; the final transient error
/// surfaces after the attempt budget is spent.
pub async fn with_retry<T, F, Fut>(op_name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = Duration::from_millis(STORE_RETRY_BASE_MS);
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(Error::Transient(msg)) if attempt < STORE_RETRY_ATTEMPTS => {
                warn!(
                    subsystem = "store",
                    op = op_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %msg,
                    "transient store failure, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
