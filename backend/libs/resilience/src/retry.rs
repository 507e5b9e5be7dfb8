/// Retry policy with exponential backoff and jitter
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = single attempt)
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add random jitter to backoff (±30%)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// One attempt, no retries
    pub fn fail_fast() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Backoff before retry number `retry` (1-based), before jitter
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_backoff.as_millis() as f64) as u64)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: u32, last_error: E },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }
}

/// Execute a future with retry logic
///
/// `operation` names the call in retry logs.
pub async fn with_retry<F, Fut, T, E>(
    config: RetryConfig,
    operation: &str,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    if config.max_retries > 0 {
                        warn!(%operation, "Max retries ({}) reached", config.max_retries);
                    }
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }

                let delay = apply_jitter(config.backoff_for(attempt), config.jitter);

                warn!(
                    %operation,
                    error = %e,
                    "Retry attempt {}/{}, waiting {:?}",
                    attempt, config.max_retries, delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn apply_jitter(base: Duration, jitter: bool) -> Duration {
    if jitter {
        let mut rng = rand::thread_rng();
        let jitter_factor = 1.0 + rng.gen_range(-0.3..0.3); // ±30%
        Duration::from_millis((base.as_millis() as f64 * jitter_factor) as u64)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let config = RetryConfig::default();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(config, "test", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(10),
            jitter: false,
            ..Default::default()
        };

        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(config, "test", move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err("temporary error")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted_keeps_last_error() {
        let config = RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(10),
            jitter: false,
            ..Default::default()
        };

        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(config, "test", move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            async move { Err::<i32, _>(format!("failure {count}")) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 3); // Initial + 2 retries
        assert_eq!(err.to_string(), "gave up after 3 attempt(s): failure 2");
        assert_eq!(err.into_inner(), "failure 2");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fail_fast_makes_single_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(RetryConfig::fail_fast(), "test", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("down") }
        })
        .await;

        assert_eq!(result.unwrap_err().attempts(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig {
            max_retries: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(config.backoff_for(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for(2), Duration::from_millis(200));
        assert_eq!(config.backoff_for(3), Duration::from_millis(400));
        assert_eq!(config.backoff_for(4), Duration::from_millis(500));
        assert_eq!(config.backoff_for(9), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_backoff_waits() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
            ..Default::default()
        };

        let start = tokio::time::Instant::now();

        let _ = with_retry(config, "test", || async { Err::<i32, _>("error") }).await;

        // Expected: 10ms + 20ms + 40ms = 70ms minimum
        assert!(start.elapsed() >= Duration::from_millis(70));
    }
}
