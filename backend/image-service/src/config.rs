/// Configuration management for the image pipeline
///
/// Loads configuration from environment variables with sensible defaults.
use crate::error::{AppError, Result};
use crate::services::transform::TransformConfig;
use event_schema::topics;
use resilience::RetryConfig;
use s3_utils::S3Config;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub s3: S3Config,
    pub transform: TransformConfig,
    /// Retry policy for task submission
    pub task_retry: RetryConfig,
    pub audit: AuditConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct KafkaConfig {
    pub brokers: String,
    pub client_id: String,
    pub task_topic: String,
    pub completion_topic: String,
    pub worker_group_id: String,
    pub completion_group_id: String,
    pub session_timeout_ms: u32,
    pub message_timeout_ms: u32,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            client_id: "image-pipeline".to_string(),
            task_topic: topics::IMAGE_TASKS.to_string(),
            completion_topic: topics::IMAGE_COMPLETED.to_string(),
            worker_group_id: "image-processor-group".to_string(),
            completion_group_id: "image-completed-group".to_string(),
            session_timeout_ms: 45_000,
            message_timeout_ms: 10_000,
        }
    }
}

impl KafkaConfig {
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.message_timeout_ms))
    }
}

#[derive(Clone, Debug)]
pub struct AuditConfig {
    /// How often the pending audit runs
    pub interval: Duration,
    /// Age after which a pending record is reported as a suspected orphan
    pub stale_after: Duration,
}

/// Upper bound for `stale_after`; larger values overflow timestamp arithmetic
const MAX_STALE_AFTER: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

impl AuditConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(AppError::Config(
                "PENDING_AUDIT_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        if self.stale_after > MAX_STALE_AFTER {
            return Err(AppError::Config(format!(
                "PENDING_STALE_AFTER_SECS must not exceed {}",
                MAX_STALE_AFTER.as_secs()
            )));
        }
        Ok(())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            stale_after: Duration::from_secs(900),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let kafka_defaults = KafkaConfig::default();
        let transform_defaults = TransformConfig::default();
        let retry_defaults = resilience::task_publish_config();
        let audit_defaults = AuditConfig::default();

        let task_retry = RetryConfig {
            max_attempts: env_or("TASK_PUBLISH_MAX_ATTEMPTS", retry_defaults.max_attempts)?,
            base_delay: Duration::from_millis(env_or(
                "TASK_PUBLISH_BASE_DELAY_MS",
                retry_defaults.base_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(env_or(
                "TASK_PUBLISH_MAX_DELAY_MS",
                retry_defaults.max_delay.as_millis() as u64,
            )?),
            jitter: retry_defaults.jitter,
        };
        if task_retry.max_attempts == 0 {
            return Err(AppError::Config(
                "TASK_PUBLISH_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if task_retry.base_delay > task_retry.max_delay {
            return Err(AppError::Config(
                "TASK_PUBLISH_BASE_DELAY_MS must not exceed TASK_PUBLISH_MAX_DELAY_MS".to_string(),
            ));
        }

        let transform = TransformConfig {
            width: env_or("THUMB_WIDTH", transform_defaults.width)?,
            height: env_or("THUMB_HEIGHT", transform_defaults.height)?,
            quality: env_or("THUMB_QUALITY", transform_defaults.quality)?,
        };
        if transform.width == 0 || transform.height == 0 {
            return Err(AppError::Config(
                "THUMB_WIDTH and THUMB_HEIGHT must be positive".to_string(),
            ));
        }

        let audit = AuditConfig {
            interval: Duration::from_secs(env_or(
                "PENDING_AUDIT_INTERVAL_SECS",
                audit_defaults.interval.as_secs(),
            )?),
            stale_after: Duration::from_secs(env_or(
                "PENDING_STALE_AFTER_SECS",
                audit_defaults.stale_after.as_secs(),
            )?),
        };
        audit.validate()?;

        Ok(Config {
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/images".to_string()),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .or_else(|_| std::env::var("KAFKA_BROKER"))
                    .unwrap_or(kafka_defaults.brokers),
                client_id: std::env::var("KAFKA_CLIENT_ID").unwrap_or(kafka_defaults.client_id),
                task_topic: non_empty_var("KAFKA_IMAGE_TASK_TOPIC")
                    .unwrap_or(kafka_defaults.task_topic),
                completion_topic: non_empty_var("KAFKA_IMAGE_COMPLETED_TOPIC")
                    .unwrap_or(kafka_defaults.completion_topic),
                worker_group_id: std::env::var("KAFKA_WORKER_GROUP_ID")
                    .unwrap_or(kafka_defaults.worker_group_id),
                completion_group_id: std::env::var("KAFKA_COMPLETION_GROUP_ID")
                    .unwrap_or(kafka_defaults.completion_group_id),
                session_timeout_ms: env_or(
                    "KAFKA_SESSION_TIMEOUT_MS",
                    kafka_defaults.session_timeout_ms,
                )?,
                message_timeout_ms: env_or(
                    "KAFKA_MESSAGE_TIMEOUT_MS",
                    kafka_defaults.message_timeout_ms,
                )?,
            },
            s3: S3Config::from_env(),
            transform,
            task_retry,
            audit,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an optional variable, rejecting values that are set but malformed
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_or(key, non_empty_var(key), default)
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key}={raw}: {e}"))),
        None => Ok(default),
    }
}
