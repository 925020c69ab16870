/// Image repository - record store operations keyed by image id
use crate::error::{AppError, Result};
use crate::models::{ImageRecord, ImageRow, NewImage, TransitionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_schema::ImageStatus;
use sqlx::PgPool;
use tracing::debug;

/// Record store contract used by the pipeline
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Insert a `pending` record; fails if the id already exists
    async fn create_pending(&self, image: &NewImage) -> Result<ImageRecord>;

    async fn get(&self, id: &str) -> Result<Option<ImageRecord>>;

    /// Move a `pending` record to a terminal status
    ///
    /// `completed_at` is written only for `Succeeded`. Records that are
    /// already terminal are left untouched.
    async fn complete(
        &self,
        id: &str,
        status: ImageStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionResult>;

    /// Pending records created before `created_before`, oldest first
    async fn list_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ImageRecord>>;
}

pub(crate) fn ensure_terminal(status: ImageStatus) -> Result<()> {
    if status.is_terminal() {
        Ok(())
    } else {
        Err(AppError::Internal(format!(
            "{status} is not a terminal status"
        )))
    }
}

pub(crate) fn completed_at_for(status: ImageStatus, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match status {
        ImageStatus::Succeeded => Some(at),
        ImageStatus::Pending | ImageStatus::Failed => None,
    }
}

/// PostgreSQL implementation over the `images` table
#[derive(Clone)]
pub struct PgImageRepository {
    pool: PgPool,
}

impl PgImageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn create_pending(&self, image: &NewImage) -> Result<ImageRecord> {
        let row = sqlx::query_as::<_, ImageRow>(
            r#"
            INSERT INTO images (id, filename, description, status, created_at, collection_id)
            VALUES ($1, $2, $3, 'pending', NOW(), $4)
            RETURNING id, filename, description, status, created_at, completed_at, collection_id
            "#,
        )
        .bind(&image.id)
        .bind(&image.filename)
        .bind(&image.description)
        .bind(&image.collection_id)
        .fetch_one(&self.pool)
        .await?;

        ImageRecord::try_from(row)
    }

    async fn get(&self, id: &str) -> Result<Option<ImageRecord>> {
        let row = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT id, filename, description, status, created_at, completed_at, collection_id
            FROM images
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ImageRecord::try_from).transpose()
    }

    async fn complete(
        &self,
        id: &str,
        status: ImageStatus,
        at: DateTime<Utc>,
    ) -> Result<TransitionResult> {
        ensure_terminal(status)?;

        // Guarded on 'pending' so redelivered completions cannot move a terminal record
        let updated = sqlx::query(
            r#"
            UPDATE images
            SET status = $2, completed_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(completed_at_for(status, at))
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(TransitionResult::Applied(status));
        }

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM images WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(current) = current else {
            return Ok(TransitionResult::Missing);
        };

        let current = current
            .parse::<ImageStatus>()
            .map_err(|e| AppError::Serialization(format!("image {id}: {e}")))?;

        debug!(id = %id, current = %current, requested = %status, "Record already terminal");

        match current {
            ImageStatus::Pending => Err(AppError::Internal(format!(
                "image {id} still pending after conditional update"
            ))),
            ImageStatus::Succeeded | ImageStatus::Failed => Ok(TransitionResult::AlreadyTerminal {
                current,
                requested: status,
            }),
        }
    }

    async fn list_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ImageRecord>> {
        let rows = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT id, filename, description, status, created_at, completed_at, collection_id
            FROM images
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(created_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ImageRecord::try_from).collect()
    }
}
