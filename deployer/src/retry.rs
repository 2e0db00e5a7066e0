use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry after a constant delay until the given number of attempts has been made
    RepeatConstant { sleep: Duration, max_attempts: u64 },
    NoRetry,
}

/// Runs the future produced by `get_future` until it succeeds or the policy gives up,
/// in which case the last error is returned.
pub async fn with_retry<F, Fut, R, Err>(get_future: F, policy: RetryPolicy) -> Result<R, Err>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<R, Err>>,
{
    let mut attempts: u64 = 0;

    loop {
        let err = match get_future().await {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };
        attempts = attempts.saturating_add(1);

        match policy {
            RetryPolicy::RepeatConstant {
                sleep: delay,
                max_attempts,
            } if attempts < max_attempts => {
                debug!(attempts, "request failed, retrying");
                sleep(delay).await;
            }
            _ => return Err(err),
        }
    }
}
