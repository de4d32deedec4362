//! Retrying transient backend failures with exponential backoff.

use std::future::Future;
use std::time::Duration;

use storage_driver::StorageError;

/// Exponentially increasing delay between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    /// The initial delay for the backoff
    pub delay: Duration,

    /// The exponent to increase the delay by
    pub exponent: u32,

    /// The maximum delay for the backoff
    pub max_delay: Duration,
}

impl Backoff {
    /// Create a new backoff policy.
    pub fn new(delay: Duration, exponent: u32, max_delay: Duration) -> Self {
        Self {
            delay,
            exponent,
            max_delay,
        }
    }

    /// Increment the backoff delay, saturating at `max_delay`.
    pub fn increment(&self) -> Self {
        let delay = self
            .delay
            .checked_mul(self.exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        Self {
            delay,
            exponent: self.exponent,
            max_delay: self.max_delay,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 2, Duration::from_secs(2))
    }
}

/// How many times a retryable storage operation is attempted, and how long
/// to wait between attempts.
///
/// Only errors for which [`StorageError::is_retryable`] holds are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Backoff::default())
    }
}

impl RetryPolicy {
    /// A policy making at most `attempts` attempts in total.
    pub fn new(attempts: u32, backoff: Backoff) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// A policy which never retries.
    pub fn never() -> Self {
        Self::new(1, Backoff::default())
    }

    /// The maximum number of attempts.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The backoff applied between attempts.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempts are used up.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut backoff = self.backoff.clone();
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.attempts => {
                    tracing::warn!(
                        attempt,
                        attempts = self.attempts,
                        delay = ?backoff.delay,
                        location = error.location(),
                        "retrying: {error}"
                    );
                    tokio::time::sleep(backoff.delay).await;
                    backoff = backoff.increment();
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use storage_driver::StorageErrorKind;

    use super::*;

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            attempts,
            Backoff::new(Duration::from_millis(1), 2, Duration::from_millis(4)),
        )
    }

    fn failure(kind: StorageErrorKind) -> StorageError {
        StorageError::new("test", kind, "failed")
    }

    #[test]
    fn backoff_saturates() {
        let backoff = Backoff::new(Duration::from_millis(10), 3, Duration::from_millis(50));
        let backoff = backoff.increment();
        assert_eq!(backoff.delay, Duration::from_millis(30));
        let backoff = backoff.increment();
        assert_eq!(backoff.delay, Duration::from_millis(50));
        assert_eq!(backoff.increment().delay, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn retries_unavailable() {
        let calls = AtomicU32::new(0);
        let result = quick(3)
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(failure(StorageErrorKind::ServiceUnavailable))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let err = quick(2)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(failure(StorageErrorKind::ServiceUnavailable))
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), StorageErrorKind::ServiceUnavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = quick(5)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(failure(StorageErrorKind::NotFound))
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), StorageErrorKind::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
