//! Retry utilities with exponential backoff.
//!
//! Used as an explicit policy layer around calls that may fail transiently.
//! Nothing in the clients retries on its own; callers opt in by wrapping a
//! call in [`with_retry`] or [`with_retry_if`].
//!
//! ```rust,no_run
//! use docbridge_clients::retry::{with_retry, RetryConfig};
//!
//! async fn example() -> Result<u32, String> {
//!     with_retry(&RetryConfig::fast(), || async { Ok(7) }).await
//! }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each failed attempt.
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    /// Short delays for calls that fail fast.
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            exponential_base: 2.0,
        }
    }

    /// Balanced configuration for most use cases.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Longer delays for external API calls.
    pub fn slow() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 1.0,
        }
    }

    /// Standard delays with a custom attempt budget.
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::standard()
        }
    }

    /// Delay slept after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Execute `f` until it succeeds or the attempt budget is spent.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
{
    with_retry_if(config, f, |_| true).await
}

/// Execute `f` with retries, giving up immediately on errors `is_retryable` rejects.
pub async fn with_retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    mut f: F,
    mut is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
    P: FnMut(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if !is_retryable(&e) => {
                tracing::debug!(error = ?e, "Error is not retryable");
                return Err(e);
            }
            Err(e) if attempt >= config.max_attempts => {
                if config.max_attempts > 1 {
                    tracing::error!(attempts = attempt, error = ?e, "All retry attempts exhausted");
                }
                return Err(e);
            }
            Err(e) => {
                let delay = config.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = ?e,
                    "Attempt failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_presets() {
        assert_eq!(RetryConfig::default().max_attempts, 3);
        assert_eq!(RetryConfig::fast().initial_delay, Duration::from_millis(50));
        assert_eq!(RetryConfig::slow().max_attempts, 5);
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
        assert_eq!(RetryConfig::with_attempts(0).max_attempts, 1);
    }

    #[test]
    fn test_delay_schedule_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            exponential_base: 2.0,
        };
        assert_eq!(config.delay_after(1), Duration::from_millis(100));
        assert_eq!(config.delay_after(2), Duration::from_millis(200));
        assert_eq!(config.delay_after(3), Duration::from_millis(400));
        assert_eq!(config.delay_after(4), Duration::from_millis(500));
        assert_eq!(config.delay_after(9), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_retries() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = with_retry(&RetryConfig::fast(), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("not yet")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let config = RetryConfig {
            max_attempts: 2,
            ..RetryConfig::fast()
        };

        let result = with_retry(&config, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>("always fails")
            }
        })
        .await;

        assert_eq!(result, Err("always fails"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_returns_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = with_retry_if(
            &RetryConfig::slow(),
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>("permanent")
                }
            },
            |_| false,
        )
        .await;

        assert_eq!(result, Err("permanent"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
