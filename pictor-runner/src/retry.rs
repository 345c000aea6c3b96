//! Retry controller
//!
//! Wraps a single remote call with transient-failure classification,
//! backoff, and a bounded attempt budget. The backoff sleep is the only
//! suspension point here, and it races the cancellation token so a
//! fail-fast abort never waits out a delay.

use std::future::Future;
use std::time::Duration;

use pictor_client::ClientError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::JobError;

const MAX_BACKOFF_SECS: f64 = 60.0;

/// Delay before the next attempt: the API's explicit retry-after hint when
/// present, otherwise exponential backoff capped at 60 seconds.
pub(crate) fn backoff_delay(err: &ClientError, attempt: u32) -> Duration {
    let secs = err
        .retry_after_hint()
        .unwrap_or_else(|| 2f64.powi(attempt as i32).min(MAX_BACKOFF_SECS));
    Duration::from_secs_f64(secs)
}

/// Run `op` up to `max_attempts` times.
///
/// Fatal errors propagate immediately. Transient errors (rate limit,
/// timeout, connection failure) are retried after a backoff delay; once the
/// budget is exhausted the last error propagates. Cancellation is checked
/// before every attempt and during the backoff sleep.
pub async fn run_with_retry<T, F, Fut>(
    label: &str,
    max_attempts: u32,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, JobError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt: u32 = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= max_attempts {
                    return Err(JobError::Remote(err));
                }

                let delay = backoff_delay(&err, attempt);
                warn!(
                    "{label} attempt {attempt}/{max_attempts} failed ({}); retrying in {:.1}s",
                    err.kind(),
                    delay.as_secs_f64()
                );

                tokio::select! {
                    _ = cancel.cancelled() => return Err(JobError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
