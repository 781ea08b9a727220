use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Exponential backoff parameters for transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; the operation runs at most
    /// `max_retries + 1` times.
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (1-based): `initial * 2^(retry-1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }
}

/// Runs `operation`, retrying with backoff while `is_transient` holds for the
/// error and retries remain. Any other error is returned immediately.
pub async fn with_retry<T, E, F, Fut, P>(
    policy: RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut retries = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if retries >= policy.max_retries || !is_transient(&err) {
                    return Err(err);
                }

                retries += 1;
                let delay = policy.delay_for(retries);
                debug!(
                    "Retrying operation after {:?} (attempt {} of {}): {}",
                    delay, retries, policy.max_retries, err
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
