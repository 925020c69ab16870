//! Completion handler - reconciles record status and cleans up objects
use crate::db::ImageRepository;
use crate::error::Result;
use crate::kafka::MessageHandler;
use crate::metrics;
use crate::models::TransitionResult;
use async_trait::async_trait;
use chrono::Utc;
use event_schema::{CompletionMessage, ImageStatus};
use s3_utils::{Bucket, ObjectStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to an object the completion removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectCleanup {
    Deleted,
    AlreadyAbsent,
    /// Delete failed; logged and ignored
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub id: String,
    pub requested: ImageStatus,
    pub transition: TransitionResult,
    pub staging: ObjectCleanup,
    /// Set when a results object written by a late success had to be removed
    pub results: Option<ObjectCleanup>,
}

pub struct CompletionHandler {
    repo: Arc<dyn ImageRepository>,
    store: Arc<dyn ObjectStore>,
}

impl CompletionHandler {
    pub fn new(repo: Arc<dyn ImageRepository>, store: Arc<dyn ObjectStore>) -> Self {
        Self { repo, store }
    }

    /// Apply one completion: record update first, then staging delete
    ///
    /// A record-update error is returned before staging is touched so the
    /// message is redelivered intact.
    pub async fn apply(&self, completion: &CompletionMessage) -> Result<CompletionReport> {
        let id = completion.id.as_str();
        let requested = completion.target_status();

        let transition = self.repo.complete(id, requested, Utc::now()).await?;

        match transition {
            TransitionResult::Applied(status) => info!(
                id = %id,
                status = %status,
                processing_time_ms = completion.processing_time,
                error = ?completion.error,
                "Image record updated"
            ),
            TransitionResult::AlreadyTerminal { current, requested } if transition.is_conflict() => warn!(
                id = %id,
                current = %current,
                requested = %requested,
                "Conflicting completion ignored, terminal status kept"
            ),
            TransitionResult::AlreadyTerminal { current, .. } => debug!(
                id = %id,
                status = %current,
                "Duplicate completion, record already terminal"
            ),
            TransitionResult::Missing => warn!(id = %id, "Completion for unknown image, acknowledging"),
        }

        metrics::COMPLETIONS_APPLIED
            .with_label_values(&[requested.as_str(), transition.label()])
            .inc();

        // A redelivered task can succeed after the record was already failed;
        // its results object must not outlive the ignored completion.
        let results = match transition {
            TransitionResult::AlreadyTerminal {
                current: ImageStatus::Failed,
                requested: ImageStatus::Succeeded,
            } => Some(self.delete_object(Bucket::Results, id).await),
            _ => None,
        };

        let staging = self.delete_object(Bucket::Staging, id).await;

        Ok(CompletionReport {
            id: id.to_string(),
            requested,
            transition,
            staging,
            results,
        })
    }

    async fn delete_object(&self, bucket: Bucket, id: &str) -> ObjectCleanup {
        match self.store.delete(bucket, id).await {
            Ok(()) => ObjectCleanup::Deleted,
            Err(e) if e.is_not_found() => {
                debug!(id = %id, bucket = %bucket, "Object already removed");
                ObjectCleanup::AlreadyAbsent
            }
            Err(e) => {
                metrics::CLEANUP_FAILURES
                    .with_label_values(&[bucket.as_str()])
                    .inc();
                warn!(id = %id, bucket = %bucket, error = %e, "Failed to delete object");
                ObjectCleanup::Failed
            }
        }
    }
}

#[async_trait]
impl MessageHandler for CompletionHandler {
    async fn handle(&self, _key: Option<&str>, payload: &[u8]) -> Result<()> {
        let completion: CompletionMessage = match serde_json::from_slice(payload) {
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = %e, "Failed to parse completion payload, skipping");
                return Ok(());
            }
        };

        self.apply(&completion).await.map(|_| ())
    }
}
