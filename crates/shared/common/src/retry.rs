//! Retry policies for store connections and outbound calls.

use std::future::Future;
use std::time::Duration;

use backon::{Backoff, BackoffBuilder, ConstantBuilder, ExponentialBuilder, Retryable};

/// When to give up and how long to wait between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryPolicy {
    /// Stop after `attempts` tries, waiting `sleep` between them.
    Fixed { attempts: u32, sleep: Duration },
    /// Jittered exponential waits capped at `max`, giving up once the
    /// accumulated waiting would pass `stop_after`.
    RandomExponential { max: Duration, stop_after: Duration },
}

impl RetryPolicy {
    pub fn fixed(attempts: u32, sleep: Duration) -> Self {
        RetryPolicy::Fixed {
            attempts: attempts.max(1),
            sleep,
        }
    }

    /// Policy used for store connections.
    pub fn random_exponential(max: Duration, stop_after: Duration) -> Self {
        RetryPolicy::RandomExponential { max, stop_after }
    }

    /// Fresh backoff iterator; `None` from it means stop.
    pub fn backoff(&self) -> Box<dyn Backoff> {
        match self {
            RetryPolicy::Fixed { attempts, sleep } => Box::new(
                ConstantBuilder::new()
                    .with_delay(*sleep)
                    .with_max_times(attempts.saturating_sub(1) as usize)
                    .build(),
            ),
            RetryPolicy::RandomExponential { max, stop_after } => {
                // jitter adds up to one more base delay
                let ceiling = (*max / 2).max(Duration::from_millis(1));
                Box::new(
                    ExponentialBuilder::new()
                        .with_jitter()
                        .with_factor(2.0)
                        .with_min_delay(Duration::from_millis(250).min(ceiling))
                        .with_max_delay(ceiling)
                        .without_max_times()
                        .with_total_delay(Some(*stop_after))
                        .build(),
                )
            }
        }
    }
}

/// Run `op` until it succeeds, `retry_if` rejects the error, or the policy
/// stops. The last error is returned.
pub async fn retry<T, E, F, Fut, P>(policy: &RetryPolicy, op: F, retry_if: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
{
    op.retry(policy.backoff())
        .when(retry_if)
        .notify(|_: &E, wait: Duration| {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "retrying");
        })
        .await
}
