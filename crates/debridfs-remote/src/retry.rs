//! Bounded retry and cancellation helpers for remote calls.
//!
//! Every attempt and every backoff sleep races the caller's cancellation token, so
//! a cancelled caller never waits for a pending request or a retry delay.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{RemoteError, RemoteResult};

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Policy used for rate-limited and transient HTTP failures.
    pub const TRANSIENT: Self = Self::new(5, Duration::from_secs(2));
    /// Policy used while polling a re-created job.
    pub const POLL: Self = Self::new(5, Duration::from_secs(1));

    /// Build a policy.
    #[must_use]
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::TRANSIENT
    }
}

/// Run `future` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`RemoteError::Cancelled`] when the token fires, otherwise the future's result.
pub async fn cancellable<T, Fut>(
    cancel: &CancellationToken,
    operation: &'static str,
    future: Fut,
) -> RemoteResult<T>
where
    Fut: Future<Output = RemoteResult<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RemoteError::Cancelled { operation }),
        result = future => result,
    }
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`RemoteError::Cancelled`] when the token fires during the sleep.
pub async fn pause(
    cancel: &CancellationToken,
    operation: &'static str,
    delay: Duration,
) -> RemoteResult<()> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RemoteError::Cancelled { operation }),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Invoke `call` until it succeeds, fails permanently, or the policy is exhausted.
///
/// Only failures classified by [`RemoteError::is_retryable`] are retried.
///
/// # Errors
///
/// Returns the last error observed, or [`RemoteError::Cancelled`].
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    operation: &'static str,
    mut call: F,
) -> RemoteResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RemoteResult<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match cancellable(cancel, operation, call()).await {
            Err(err) if err.is_retryable() && attempt < attempts => {
                warn!(
                    operation,
                    attempt,
                    status = ?err.status(),
                    "remote call failed transiently; backing off"
                );
                pause(cancel, operation, policy.delay).await?;
                attempt += 1;
            }
            other => return other,
        }
    }
}
