//! Retry of transient remote failures
//!
//! Transient failures (network, timeouts, HTTP 429 and 5xx) are retried with
//! exponential backoff. Anything else is returned to the caller on the first
//! attempt.

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::RemoteError;

/// Backoff settings for [`with_retry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// 1s, 2s, 4s, 8s, 16s
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy with the default base delay
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }
}

/// Checks if an error is transient and should be retried
///
/// Typed [`RemoteError`]s are classified directly. Other errors fall back to
/// message inspection for network, rate limiting and server errors.
pub fn is_transient_error(err: &anyhow::Error) -> bool {
    if let Some(remote) = err.downcast_ref::<RemoteError>() {
        return remote.is_transient();
    }

    let err_str = format!("{err:#}").to_lowercase();

    // Network errors
    if err_str.contains("network")
        || err_str.contains("connection")
        || err_str.contains("timeout")
        || err_str.contains("timed out")
        || err_str.contains("dns")
        || err_str.contains("reset by peer")
        || err_str.contains("broken pipe")
    {
        return true;
    }

    // Rate limiting
    if err_str.contains("429")
        || err_str.contains("too many requests")
        || err_str.contains("rate limit")
    {
        return true;
    }

    // Server errors (5xx)
    if err_str.contains("500")
        || err_str.contains("502")
        || err_str.contains("503")
        || err_str.contains("504")
        || err_str.contains("server error")
    {
        return true;
    }

    false
}

/// Executes an async operation with exponential backoff retry
///
/// Only retries on transient errors (network, rate limiting, server errors).
/// Non-transient errors are returned immediately. A
/// [`RemoteError::TooManyRequests`] waits at least its `retry_after`.
pub async fn with_retry<F, Fut, T>(operation_name: &str, policy: RetryPolicy, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= policy.max_retries || !is_transient_error(&err) {
                    return Err(err);
                }

                let mut delay = policy.delay_for(attempt);
                if let Some(RemoteError::TooManyRequests { retry_after }) =
                    err.downcast_ref::<RemoteError>()
                {
                    delay = delay.max(*retry_after);
                }

                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
