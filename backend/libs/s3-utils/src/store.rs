//! Object store abstraction keyed by `(bucket, id)`

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

/// Logical buckets used by the image pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Raw uploaded bytes, present while the image is pending
    Staging,
    /// Transformed bytes, present once the image succeeded
    Results,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Staging => "staging",
            Bucket::Results => "results",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: Bucket, key: String },

    #[error("{operation} {bucket}/{key} failed: {message}")]
    Backend {
        operation: &'static str,
        bucket: Bucket,
        key: String,
        message: String,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Minimal object storage contract consumed by the pipeline
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full object body
    async fn get(&self, bucket: Bucket, key: &str) -> Result<Bytes, StorageError>;

    /// Store an object, replacing any existing one
    ///
    /// `content_type` is informational only; nothing in the pipeline reads it back.
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Remove an object
    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StorageError>;
}
