//! Pending audit - surfaces records that never received a completion
use crate::db::ImageRepository;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::ImageRecord;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

const AUDIT_BATCH_LIMIT: i64 = 500;
const MIN_AUDIT_INTERVAL: Duration = Duration::from_secs(1);

pub struct PendingAudit {
    repo: Arc<dyn ImageRepository>,
    stale_after: Duration,
}

impl PendingAudit {
    pub fn new(repo: Arc<dyn ImageRepository>, stale_after: Duration) -> Self {
        Self { repo, stale_after }
    }

    /// List and report pending records older than `stale_after`
    pub async fn run_once(&self) -> Result<Vec<ImageRecord>> {
        let now = Utc::now();
        let cutoff = chrono::Duration::from_std(self.stale_after)
            .ok()
            .and_then(|stale_after| now.checked_sub_signed(stale_after))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "stale_after of {}s is out of range",
                    self.stale_after.as_secs()
                ))
            })?;

        let stale = self
            .repo
            .list_stale_pending(cutoff, AUDIT_BATCH_LIMIT)
            .await?;

        for record in &stale {
            warn!(
                id = %record.id,
                created_at = %record.created_at,
                age_secs = (now - record.created_at).num_seconds(),
                "Pending record exceeded audit threshold, task may be orphaned"
            );
        }

        metrics::STALE_PENDING_RECORDS.set(stale.len() as i64);
        Ok(stale)
    }

    /// Run on `interval` until shutdown, starting immediately
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        // tokio::time::interval panics on a zero period
        let interval = interval.max(MIN_AUDIT_INTERVAL);
        info!(interval_secs = interval.as_secs(), "Starting pending audit");

        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Pending audit shutting down");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(stale) if !stale.is_empty() => {
                            info!(stale = stale.len(), "Pending audit completed");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Pending audit failed, will retry next interval"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryImageRepository;
    use crate::models::NewImage;
    use event_schema::ImageStatus;

    #[tokio::test]
    async fn test_reports_only_old_pending_records() {
        let repo = Arc::new(InMemoryImageRepository::new());
        let now = Utc::now();
        repo.insert(NewImage::new("fresh", "a.png").into_pending_record(now));
        repo.insert(
            NewImage::new("stuck", "b.png").into_pending_record(now - chrono::Duration::hours(2)),
        );
        let mut done =
            NewImage::new("done", "c.png").into_pending_record(now - chrono::Duration::hours(3));
        done.status = ImageStatus::Failed;
        repo.insert(done);

        let audit = PendingAudit::new(repo, Duration::from_secs(900));
        let stale = audit.run_once().await.unwrap();

        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, "stuck");
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let repo = Arc::new(InMemoryImageRepository::new());
        repo.set_unavailable(true);

        let audit = PendingAudit::new(repo, Duration::from_secs(60));
        assert!(matches!(audit.run_once().await, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_out_of_range_threshold_is_an_error() {
        let repo = Arc::new(InMemoryImageRepository::new());

        let audit = PendingAudit::new(repo.clone(), Duration::from_secs(u64::MAX));
        assert!(matches!(audit.run_once().await, Err(AppError::Config(_))));

        // A million years fits chrono::Duration but not the timestamp range
        let audit = PendingAudit::new(repo, Duration::from_secs(1_000_000 * 365 * 24 * 60 * 60));
        assert!(matches!(audit.run_once().await, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_zero_interval_still_runs_until_shutdown() {
        let repo = Arc::new(InMemoryImageRepository::new());
        let audit = Arc::new(PendingAudit::new(repo, Duration::from_secs(60)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(audit.run(Duration::ZERO, shutdown_rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("audit did not stop")
            .expect("audit task panicked");
    }
}
