//! Task worker - consumes tasks, transforms staged bytes, reports completions
//!
//! Every accepted task message yields exactly one completion: a successful
//! transform reports `success=true`, any fetch/decode/encode/store failure
//! reports `success=false` with the error text.

use super::transform::{ImageTransformer, TransformedImage};
use crate::error::{AppError, Result};
use crate::kafka::{MessageHandler, MessagePublisher};
use crate::metrics;
use async_trait::async_trait;
use chrono::Utc;
use event_schema::{CompletionMessage, TaskMessage};
use resilience::{with_retry, RetryConfig};
use s3_utils::{Bucket, ObjectStore};
use std::sync::Arc;
use tracing::{info, warn};

const RESULT_CONTENT_TYPE: &str = "image/jpeg";

pub struct TaskWorker {
    store: Arc<dyn ObjectStore>,
    transformer: Arc<ImageTransformer>,
    publisher: Arc<dyn MessagePublisher>,
    completion_topic: String,
    completion_retry: RetryConfig,
}

impl TaskWorker {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        transformer: Arc<ImageTransformer>,
        publisher: Arc<dyn MessagePublisher>,
        completion_topic: impl Into<String>,
        completion_retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            transformer,
            publisher,
            completion_topic: completion_topic.into(),
            completion_retry,
        }
    }

    /// Run the transform for one task and build its completion
    pub async fn process(&self, task: &TaskMessage) -> CompletionMessage {
        let outcome = self.transform_and_store(task).await;
        let processing_time = task.elapsed_ms(Utc::now().timestamp_millis());
        metrics::PROCESSING_TIME_MS.observe(processing_time as f64);

        match outcome {
            Ok(result) => {
                metrics::TASKS_PROCESSED.with_label_values(&["success"]).inc();
                info!(
                    id = %task.id,
                    processing_time_ms = processing_time,
                    size = result.data.len(),
                    "Image processed"
                );
                CompletionMessage::succeeded(&task.id, processing_time)
            }
            Err(e) => {
                metrics::TASKS_PROCESSED.with_label_values(&["failure"]).inc();
                warn!(
                    id = %task.id,
                    processing_time_ms = processing_time,
                    error = %e,
                    "Image processing failed"
                );
                CompletionMessage::failed(&task.id, processing_time, e.to_string())
            }
        }
    }

    /// Process a task and publish its completion
    ///
    /// Only a completion that cannot be published is an error.
    pub async fn handle_task(&self, task: &TaskMessage) -> Result<CompletionMessage> {
        let completion = self.process(task).await;
        self.publish_completion(&completion).await?;
        Ok(completion)
    }

    async fn transform_and_store(&self, task: &TaskMessage) -> Result<TransformedImage> {
        let original = self.store.get(Bucket::Staging, &task.id).await?;
        let result = self.transformer.clone().transform_async(original).await?;
        self.store
            .put(
                Bucket::Results,
                &task.id,
                result.data.clone(),
                Some(RESULT_CONTENT_TYPE),
            )
            .await?;
        Ok(result)
    }

    async fn publish_completion(&self, completion: &CompletionMessage) -> Result<()> {
        let payload = serde_json::to_vec(completion)?;
        let payload = payload.as_slice();
        let publisher = self.publisher.as_ref();
        let topic = self.completion_topic.as_str();

        with_retry(&self.completion_retry, move |_| async move {
            publisher.ensure_connected().await?;
            publisher.publish(topic, &completion.id, payload).await
        })
        .await
        .map_err(|e| AppError::Broker(e.into_inner()))
    }
}

#[async_trait]
impl MessageHandler for TaskWorker {
    async fn handle(&self, _key: Option<&str>, payload: &[u8]) -> Result<()> {
        let task: TaskMessage = match serde_json::from_slice(payload) {
            Ok(task) => task,
            Err(e) => {
                warn!(error = %e, "Failed to parse task payload, skipping");
                return Ok(());
            }
        };

        self.handle_task(&task).await.map(|_| ())
    }
}
