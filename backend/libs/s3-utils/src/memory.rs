/// In-process object store for local runs and tests
use crate::store::{Bucket, ObjectStore, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    content_type: Option<String>,
}

/// HashMap-backed `ObjectStore`
///
/// Unlike S3, deleting a missing key reports `NotFound`, which lets callers
/// exercise their cleanup-failure paths.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<(Bucket, String), StoredObject>>,
    fail_writes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail with a backend error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, bucket: Bucket, key: &str) -> bool {
        self.objects.read().contains_key(&(bucket, key.to_string()))
    }

    pub fn object(&self, bucket: Bucket, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .get(&(bucket, key.to_string()))
            .map(|o| o.body.clone())
    }

    pub fn content_type(&self, bucket: Bucket, key: &str) -> Option<String> {
        self.objects
            .read()
            .get(&(bucket, key.to_string()))
            .and_then(|o| o.content_type.clone())
    }

    pub fn len(&self, bucket: Bucket) -> usize {
        self.objects.read().keys().filter(|(b, _)| *b == bucket).count()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: Bucket, key: &str) -> Result<Bytes, StorageError> {
        self.object(bucket, key).ok_or_else(|| StorageError::NotFound {
            bucket,
            key: key.to_string(),
        })
    }

    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend {
                operation: "put",
                bucket,
                key: key.to_string(),
                message: "write rejected".to_string(),
            });
        }

        self.objects.write().insert(
            (bucket, key.to_string()),
            StoredObject {
                body,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StorageError> {
        match self.objects.write().remove(&(bucket, key.to_string())) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound {
                bucket,
                key: key.to_string(),
            }),
        }
    }
}
