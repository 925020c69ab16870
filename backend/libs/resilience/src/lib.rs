/// Retry policies for broker and storage calls
///
/// This library provides bounded exponential backoff with an explicit attempt
/// ceiling, independent of any client library's built-in retry machinery, so
/// the policy can be configured and tested on its own.
///
/// # Example: Publish with retry
///
/// ```rust,no_run
/// use resilience::{presets, with_retry};
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::task_publish_config();
///
///     let result = with_retry(&config, |attempt| async move {
///         // Your publish call here
///         let _ = attempt;
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```

pub mod presets;
pub mod retry;

// Re-export main types for convenience
pub use presets::{completion_publish_config, task_publish_config};
pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
