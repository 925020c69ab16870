/// In-process record store for local runs and tests
use super::image_repo::{completed_at_for, ensure_terminal, ImageRepository};
use crate::error::{AppError, Result};
use crate::models::{ImageRecord, NewImage, TransitionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_schema::ImageStatus;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// HashMap-backed `ImageRepository` with the same transition rules as the
/// PostgreSQL implementation
#[derive(Debug, Default)]
pub struct InMemoryImageRepository {
    records: RwLock<HashMap<String, ImageRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryImageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record as-is
    pub fn insert(&self, record: ImageRecord) {
        self.records.write().insert(record.id.clone(), record);
    }

    /// Simulate the database being down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn snapshot(&self, id: &str) -> Option<ImageRecord> {
        self.records.read().get(id).cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database("record store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageRepository for InMemoryImageRepository {
    async fn create_pending(&self, image: &NewImage) -> Result<ImageRecord> {
        self.check_available()?;

        let mut records = self.records.write();
        if records.contains_key(&image.id) {
            return Err(AppError::Database(format!(
                "duplicate key value violates unique constraint: images.id = {}",
                image.id
            )));
        }

        let record = image.clone().into_pending_record(Utc::now());
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<ImageRecord>> {
        self.check_available()?;
        Ok(self.snapshot(id))
    }

    async fn complete(
        &self,
        id: &str,
        status: ImageStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionResult> {
        self.check_available()?;
        ensure_terminal(status)?;

        let mut records = self.records.write();
        let Some(record) = records.get_mut(id) else {
            return Ok(TransitionResult::Missing);
        };

        if !record.status.can_transition_to(status) {
            return Ok(TransitionResult::AlreadyTerminal {
                current: record.status,
                requested: status,
            });
        }

        record.status = status;
        record.completed_at = completed_at_for(status, at);
        Ok(TransitionResult::Applied(status))
    }

    async fn list_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ImageRecord>> {
        self.check_available()?;

        let mut stale: Vec<ImageRecord> = self
            .records
            .read()
            .values()
            .filter(|r| r.status == ImageStatus::Pending && r.created_at < created_before)
            .cloned()
            .collect();
        stale.sort_by_key(|r| r.created_at);
        stale.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_pending_rejects_duplicates() {
        let repo = InMemoryImageRepository::new();
        let image = NewImage::new("t1", "cat.png");

        let record = repo.create_pending(&image).await.unwrap();
        assert_eq!(record.status, ImageStatus::Pending);
        assert!(record.completed_at.is_none());
        assert!(repo.create_pending(&image).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_completion_sets_no_timestamp() {
        let repo = InMemoryImageRepository::new();
        repo.create_pending(&NewImage::new("t1", "cat.png")).await.unwrap();

        let result = repo.complete("t1", ImageStatus::Failed, Utc::now()).await.unwrap();
        assert_eq!(result, TransitionResult::Applied(ImageStatus::Failed));

        let record = repo.snapshot("t1").unwrap();
        assert_eq!(record.status, ImageStatus::Failed);
        assert!(record.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_pending_is_not_a_completion_target() {
        let repo = InMemoryImageRepository::new();
        repo.create_pending(&NewImage::new("t1", "cat.png")).await.unwrap();
        assert!(repo.complete("t1", ImageStatus::Pending, Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn test_list_stale_pending_orders_and_limits() {
        let repo = InMemoryImageRepository::new();
        let now = Utc::now();
        for (id, age_mins) in [("new", 1), ("old", 60), ("older", 120)] {
            repo.insert(NewImage::new(id, "x.png").into_pending_record(now - Duration::minutes(age_mins)));
        }
        let mut done = NewImage::new("done", "x.png").into_pending_record(now - Duration::minutes(500));
        done.status = ImageStatus::Succeeded;
        repo.insert(done);

        let stale = repo
            .list_stale_pending(now - Duration::minutes(30), 10)
            .await
            .unwrap();
        let ids: Vec<_> = stale.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["older", "old"]);

        let limited = repo
            .list_stale_pending(now - Duration::minutes(30), 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }
}
