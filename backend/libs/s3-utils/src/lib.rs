/// Shared object storage utilities for the image pipeline
///
/// Provides the `ObjectStore` contract over two logical buckets (staging and
/// results), an AWS S3 / MinIO implementation, and an in-memory one.
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use std::sync::Arc;
use tracing::info;

pub mod config;
pub mod memory;
pub mod operations;
pub mod store;

pub use config::S3Config;
pub use memory::MemoryObjectStore;
pub use store::{Bucket, ObjectStore, StorageError};

/// Shared S3 client wrapper
#[derive(Clone)]
pub struct S3Client {
    client: Arc<Client>,
    config: S3Config,
}

impl S3Client {
    /// Create new S3 client with configuration from environment
    pub async fn new() -> Self {
        Self::with_config(S3Config::from_env()).await
    }

    /// Create new S3 client with custom configuration
    pub async fn with_config(config: S3Config) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "s3-utils-static",
            ));
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        let client = Client::from_conf(builder.force_path_style(config.path_style).build());

        info!(
            staging_bucket = %config.staging_bucket,
            results_bucket = %config.results_bucket,
            endpoint = ?config.endpoint,
            "S3 client initialized"
        );

        Self {
            client: Arc::new(client),
            config,
        }
    }

    /// Get reference to underlying AWS S3 client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get S3 configuration
    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// Health check: both buckets must be reachable
    pub async fn health_check(&self) -> Result<(), StorageError> {
        for bucket in [Bucket::Staging, Bucket::Results] {
            self.client
                .head_bucket()
                .bucket(self.config.bucket_name(bucket))
                .send()
                .await
                .map_err(|e| StorageError::Backend {
                    operation: "head_bucket",
                    bucket,
                    key: String::new(),
                    message: DisplayErrorContext(&e).to_string(),
                })?;
        }

        Ok(())
    }
}
