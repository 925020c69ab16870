/// S3 object operations backing the `ObjectStore` contract
use crate::store::{Bucket, ObjectStore, StorageError};
use crate::S3Client;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

#[async_trait]
impl ObjectStore for S3Client {
    async fn get(&self, bucket: Bucket, key: &str) -> Result<Bytes, StorageError> {
        let response = self
            .client()
            .get_object()
            .bucket(self.config().bucket_name(bucket))
            .key(key)
            .send()
            .await;

        let output = match response {
            Ok(output) => output,
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    return Err(StorageError::NotFound {
                        bucket,
                        key: key.to_string(),
                    });
                }
                return Err(backend_error("get", bucket, key, DisplayErrorContext(&err)));
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| backend_error("read", bucket, key, e))?;

        let bytes = body.into_bytes();
        debug!(bucket = %bucket, key = %key, size = bytes.len(), "Downloaded object");
        Ok(bytes)
    }

    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let size = body.len();
        let mut request = self
            .client()
            .put_object()
            .bucket(self.config().bucket_name(bucket))
            .key(key)
            .body(ByteStream::from(body));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|e| backend_error("put", bucket, key, DisplayErrorContext(&e)))?;

        debug!(bucket = %bucket, key = %key, size, "Uploaded object");
        Ok(())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StorageError> {
        // S3 reports success for keys that are already gone
        self.client()
            .delete_object()
            .bucket(self.config().bucket_name(bucket))
            .key(key)
            .send()
            .await
            .map_err(|e| backend_error("delete", bucket, key, DisplayErrorContext(&e)))?;

        debug!(bucket = %bucket, key = %key, "Deleted object");
        Ok(())
    }
}

fn backend_error(
    operation: &'static str,
    bucket: Bucket,
    key: &str,
    err: impl std::fmt::Display,
) -> StorageError {
    StorageError::Backend {
        operation,
        bucket,
        key: key.to_string(),
        message: err.to_string(),
    }
}
