/// S3 configuration shared by the ingestion side and the workers
use crate::store::Bucket;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Bucket holding raw uploads until they are processed
    pub staging_bucket: String,
    /// Bucket holding transformed images
    pub results_bucket: String,
    /// AWS region
    pub region: String,
    /// Custom endpoint (MinIO, localstack)
    pub endpoint: Option<String>,
    /// Whether to use path-style URLs (false = virtual-hosted-style)
    pub path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            staging_bucket: "image-uploads".to_string(),
            results_bucket: "image-results".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl S3Config {
    /// Load S3 configuration from environment variables
    ///
    /// The `MINIO_*` names are accepted for deployments that still use them.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let endpoint = std::env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty());

        Self {
            staging_bucket: std::env::var("S3_STAGING_BUCKET")
                .or_else(|_| std::env::var("MINIO_BUCKET_UPLOAD"))
                .unwrap_or(defaults.staging_bucket),
            results_bucket: std::env::var("S3_RESULTS_BUCKET")
                .or_else(|_| std::env::var("MINIO_BUCKET_COMPLETED"))
                .unwrap_or(defaults.results_bucket),
            region: std::env::var("AWS_REGION").unwrap_or(defaults.region),
            // MinIO only serves path-style requests
            path_style: endpoint.is_some()
                || std::env::var("S3_PATH_STYLE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(false),
            endpoint,
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
        }
    }

    /// Physical bucket name for a logical bucket
    pub fn bucket_name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Staging => &self.staging_bucket,
            Bucket::Results => &self.results_bucket,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_name_mapping() {
        let config = S3Config {
            staging_bucket: "uploads".to_string(),
            results_bucket: "thumbs".to_string(),
            ..Default::default()
        };

        assert_eq!(config.bucket_name(Bucket::Staging), "uploads");
        assert_eq!(config.bucket_name(Bucket::Results), "thumbs");
    }
}
