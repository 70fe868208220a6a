//! Caller-supplied retry policy.
//!
//! The client never retries unless handed a policy. Only transient errors
//! (network failures and 5xx responses) are repeated.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, TransportError};

/// How often and how patiently transient read failures are repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// No retries.
    pub fn none() -> Self {
        Self::default()
    }

    /// Doubling delays from `base_delay`, capped at 32 times it.
    pub fn exponential(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: base_delay.saturating_mul(32),
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` to give up.
    pub fn backoff(&self, attempt: u32, err: &TransportError) -> Option<Duration> {
        if attempt > self.max_retries || !err.is_transient() {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }

    /// Run `call` until it succeeds, fails permanently or runs out of retries.
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempt += 1;
            let Some(delay) = self.backoff(attempt, &err) else {
                return Err(err);
            };
            debug!(attempt, delay_ms = delay.as_millis(), error = %err, "Retrying request.");
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransportError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn server_error() -> TransportError {
        TransportError::HttpStatus {
            status: 502,
            body: String::new(),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
        };
        let err = server_error();
        assert_eq!(policy.backoff(1, &err), Some(Duration::from_millis(100)));
        assert_eq!(policy.backoff(2, &err), Some(Duration::from_millis(200)));
        assert_eq!(policy.backoff(3, &err), Some(Duration::from_millis(250)));
        assert_eq!(policy.backoff(6, &err), None);
    }

    #[test]
    fn test_default_never_retries() {
        assert_eq!(RetryPolicy::none().backoff(1, &server_error()), None);
    }

    #[tokio::test]
    async fn test_run_retries_transient_only() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(1));
        let cancel = CancellationToken::new();

        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = policy
            .run(&cancel, move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(server_error())
                } else {
                    Ok("ok")
                }
            })
            .await;
        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = policy
            .run(&cancel, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::HttpStatus {
                    status: 404,
                    body: String::new(),
                })
            })
            .await;
        assert_eq!(result.unwrap_err().status(), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
