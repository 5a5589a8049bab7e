use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::warn;

use crate::DelayRetryPolicy;
use crate::Error;
use crate::Result;

/// Re-runs `task` on retryable errors with capped exponential backoff.
///
/// Non-retryable errors are returned at once. Once `policy.retry_count`
/// retries are used up the last error is wrapped in
/// [`Error::RetryExhausted`]. Cancelling `cancel` aborts the wait between
/// attempts with [`Error::Interrupted`].
pub(crate) async fn retry_with_backoff<F, T, P>(
    name: &str,
    mut task: F,
    policy: DelayRetryPolicy,
    cancel: &CancellationToken,
) -> Result<P>
where
    F: FnMut() -> T,
    T: Future<Output = Result<P>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Interrupted);
    }

    match task().await {
        Ok(r) => Ok(r),
        Err(e) if e.is_retryable() => resume_with_backoff(name, task, policy, cancel, e).await,
        Err(e) => Err(e),
    }
}

/// Continues [`retry_with_backoff`] after a first attempt already failed with
/// the retryable error `first`.
///
/// The failed attempt counts against the budget: at most
/// `policy.retry_count` further attempts are made, starting with the delay
/// for retry #1.
pub(crate) async fn resume_with_backoff<F, T, P>(
    name: &str,
    mut task: F,
    policy: DelayRetryPolicy,
    cancel: &CancellationToken,
    first: Error,
) -> Result<P>
where
    F: FnMut() -> T,
    T: Future<Output = Result<P>>,
{
    let mut retries = 0;
    let mut last = first;
    loop {
        if retries >= policy.retry_count {
            warn!("{name} failed after {} retries: {:?}", retries, last);
            return Err(exhausted(retries + 1, last));
        }

        retries += 1;
        let delay = with_jitter(policy.delay_for(retries), policy.max_delay_ms);
        warn!("{name} failed with {:?}, retry #{retries} in {:?}", last, delay);
        interruptible_sleep(delay, cancel).await?;
        if cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }

        last = match task().await {
            Ok(r) => return Ok(r),
            Err(e) if e.is_retryable() => e,
            Err(e) => return Err(e),
        };
    }
}

pub(crate) fn exhausted(
    attempts: usize,
    last: Error,
) -> Error {
    Error::RetryExhausted {
        attempts,
        last: Box::new(last),
    }
}

/// Sleeps for `duration` unless `cancel` fires first.
pub(crate) async fn interruptible_sleep(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Interrupted),
        _ = sleep(duration) => Ok(()),
    }
}

// Up to 25% extra, never past the cap.
fn with_jitter(
    delay: Duration,
    max_delay_ms: u64,
) -> Duration {
    let base = delay.as_millis() as u64;
    let spread = base / 4;
    if spread == 0 {
        return delay;
    }
    let jitter = rand::thread_rng().gen_range(0..=spread);
    Duration::from_millis((base + jitter).min(max_delay_ms.max(base)))
}

// Helper function to spawn background tasks that only report their failure
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    })
}
