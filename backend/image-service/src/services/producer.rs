//! Task producer - publishes ready-to-process tasks with bounded retry
use crate::error::{AppError, Result};
use crate::kafka::MessagePublisher;
use crate::metrics;
use event_schema::TaskMessage;
use resilience::{with_retry, RetryConfig};
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct TaskProducer {
    publisher: Arc<dyn MessagePublisher>,
    topic: String,
    retry: RetryConfig,
}

impl TaskProducer {
    pub fn new(
        publisher: Arc<dyn MessagePublisher>,
        topic: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            retry,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish a task keyed by its id
    ///
    /// The caller must already have created the `pending` record and staged
    /// the bytes. Each attempt re-checks the connection before sending. When
    /// the retry budget is spent the record is left `pending` and
    /// `AppError::PublishFailed` is returned.
    pub async fn submit(&self, task: &TaskMessage) -> Result<()> {
        let payload = serde_json::to_vec(task)?;
        let payload = payload.as_slice();
        let publisher = self.publisher.as_ref();
        let topic = self.topic.as_str();

        let outcome = with_retry(&self.retry, move |attempt| async move {
            debug!(id = %task.id, attempt, "Publishing task");
            publisher.ensure_connected().await?;
            publisher.publish(topic, &task.id, payload).await
        })
        .await;

        match outcome {
            Ok(()) => {
                metrics::TASKS_PUBLISHED.inc();
                info!(id = %task.id, topic = %topic, "Task published");
                Ok(())
            }
            Err(err) => {
                let attempts = err.attempts();
                let source = err.into_inner();
                metrics::TASK_PUBLISH_FAILURES.inc();
                error!(
                    id = %task.id,
                    topic = %topic,
                    attempts,
                    error = %source,
                    "Task publish failed, record left pending"
                );
                Err(AppError::PublishFailed {
                    id: task.id.clone(),
                    attempts,
                    source,
                })
            }
        }
    }
}
