/// Preset retry policies for the image pipeline's broker calls
use crate::retry::RetryConfig;
use std::time::Duration;

/// Task submission from the ingestion side
///
/// - 5 attempts
/// - 200ms, 400ms, 800ms, 1600ms between attempts (3s cap)
pub fn task_publish_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 5,
        base_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(3),
        jitter: false,
    }
}

/// Completion publish from the worker
///
/// Longer ceiling: a worker that cannot report leaves its offset uncommitted,
/// so giving up early only delays the redelivery.
pub fn completion_publish_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 10,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(30),
        jitter: true,
    }
}
