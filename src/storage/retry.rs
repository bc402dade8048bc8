use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::failure::{ProviderFailure, RetryClass};

/// Bounded retry with linearly increasing delay.
///
/// The delay before attempt `n + 1` is `base_delay × n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (at least 1)
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after `completed` failed attempts
    pub fn delay_after(&self, completed: u32) -> Duration {
        self.base_delay * completed
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Returns the value together with the number of attempts used. On
    /// exhaustion the last provider failure is returned unchanged.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<(T, u32), ProviderFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok((value, attempt)),
                Err(failure) => {
                    if failure.class() == RetryClass::Permanent || attempt >= attempts {
                        return Err(failure);
                    }
                    let delay = self.delay_after(attempt);
                    warn!(
                        op = operation,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "transient storage failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::failure::NetworkCause;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_linear_delay() {
        let policy = RetryPolicy::new(4, Duration::from_millis(200));
        assert_eq!(policy.delay_after(1), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = quick(5)
            .run("list", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ProviderFailure::network("list", NetworkCause::Timeout, "timed out"))
                } else {
                    Ok("done")
                }
            })
            .await
            .unwrap();

        assert_eq!(result, ("done", 3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_fails_immediately() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let err = quick(5)
            .run("put", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ProviderFailure::service("put", Some(403), Some("AccessDenied".into()), "denied"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.code.as_deref(), Some("AccessDenied"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_failure() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let err = quick(3)
            .run("put", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ProviderFailure::service("put", Some(503), None, format!("attempt {n}")))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.message, "attempt 2");
    }
}
