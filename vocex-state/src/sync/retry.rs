//! Inline retry with a per-routine attempt cap.

use std::{fmt::Display, future::Future, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::SyncError;

/// Pause between attempts.
pub(crate) const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Runs `attempt` until it succeeds, retrying up to `cap` times after the first failure.
///
/// Once the cap is exceeded `token` is cancelled, terminating the owning routine, and
/// [`SyncError::RetryLimit`] is returned. A token that is already cancelled aborts the
/// loop before the next attempt.
pub(crate) async fn retry_with_cap<T, E, F, Fut>(
    operation: &str,
    cap: u32,
    token: &CancellationToken,
    mut attempt: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut failures: u32 = 0;
    loop {
        if token.is_cancelled() {
            return Err(SyncError::Cancelled(operation.to_string()));
        }
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                failures += 1;
                if failures > cap {
                    error!("{operation} failed {failures} times, terminating routine: {e}");
                    token.cancel();
                    return Err(SyncError::RetryLimit {
                        operation: operation.to_string(),
                        attempts: failures,
                    });
                }
                warn!("{operation} failed (attempt {failures}/{}): {e}", cap + 1);
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}
