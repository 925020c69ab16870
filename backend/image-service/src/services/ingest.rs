//! Ingest service - stages an upload and submits its task
use super::producer::TaskProducer;
use crate::db::ImageRepository;
use crate::error::Result;
use crate::models::{ImageRecord, NewImage};
use bytes::Bytes;
use event_schema::TaskMessage;
use s3_utils::{Bucket, ObjectStore};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// An accepted upload
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub filename: String,
    pub description: Option<String>,
    pub collection_id: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

pub struct IngestService {
    repo: Arc<dyn ImageRepository>,
    store: Arc<dyn ObjectStore>,
    producer: Arc<TaskProducer>,
}

impl IngestService {
    pub fn new(
        repo: Arc<dyn ImageRepository>,
        store: Arc<dyn ObjectStore>,
        producer: Arc<TaskProducer>,
    ) -> Self {
        Self {
            repo,
            store,
            producer,
        }
    }

    /// Stage the bytes, create the `pending` record, then publish the task
    ///
    /// If publishing fails the record stays `pending` and the error is
    /// returned; the pending audit reports it later.
    pub async fn ingest(&self, request: IngestRequest) -> Result<ImageRecord> {
        let id = Uuid::new_v4().to_string();

        self.store
            .put(
                Bucket::Staging,
                &id,
                request.body,
                request.content_type.as_deref(),
            )
            .await?;

        let record = self
            .repo
            .create_pending(&NewImage {
                id: id.clone(),
                filename: request.filename,
                description: request.description,
                collection_id: request.collection_id,
            })
            .await?;

        info!(id = %id, filename = %record.filename, "Image staged, submitting task");

        self.producer.submit(&TaskMessage::new(id)).await?;
        Ok(record)
    }
}
