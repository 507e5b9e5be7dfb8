/// Resilience patterns for the relay's backend connections
///
/// - **Retry**: Exponential backoff with jitter for transient failures
///
/// # Example: Connect with bounded retries
///
/// ```rust,no_run
/// use resilience::{with_retry, RetryConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let config = RetryConfig {
///         max_retries: 5,
///         initial_backoff: Duration::from_millis(200),
///         ..Default::default()
///     };
///
///     let result = with_retry(config, "redis connect", || async {
///         // Your connection attempt here
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```

pub mod retry;

pub use retry::{with_retry, RetryConfig, RetryError};
