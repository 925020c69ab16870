/// Error types for the image pipeline
///
/// Connectivity, transform, storage and record-update failures are kept apart
/// so each consumer can decide whether a message is retried, reported or
/// acknowledged.
use crate::kafka::BrokerError;
use s3_utils::StorageError;

/// Result type for image-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Record store operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Object store operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Broker connection or delivery failed
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Task could not be published within the retry budget
    #[error("Failed to publish task {id} after {attempts} attempts: {source}")]
    PublishFailed {
        id: String,
        attempts: u32,
        #[source]
        source: BrokerError,
    },

    /// Image decode or encode failed
    #[error("Transform error: {0}")]
    Transform(String),

    /// Message payload or record value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors worth redelivering the message for; `ConsumerLoop` commits past
    /// anything else
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Broker(_)
                | AppError::PublishFailed { .. }
                | AppError::Storage(StorageError::Backend { .. })
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Transform(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use s3_utils::Bucket;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::Database("connection refused".into()).is_transient());
        assert!(AppError::Broker(BrokerError::NotConnected).is_transient());
        assert!(!AppError::Transform("bad header".into()).is_transient());
        assert!(!AppError::Storage(StorageError::NotFound {
            bucket: Bucket::Staging,
            key: "t1".into(),
        })
        .is_transient());
        assert!(!AppError::Serialization("unknown status".into()).is_transient());
        assert!(AppError::Storage(StorageError::Backend {
            operation: "delete",
            bucket: Bucket::Staging,
            key: "t1".into(),
            message: "timeout".into(),
        })
        .is_transient());
    }

    #[test]
    fn test_publish_failed_message() {
        let err = AppError::PublishFailed {
            id: "t3".into(),
            attempts: 5,
            source: BrokerError::NotConnected,
        };
        assert!(err.to_string().starts_with("Failed to publish task t3 after 5 attempts"));
    }
}
