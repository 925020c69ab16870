/// Image record model
use crate::error::AppError;
use chrono::{DateTime, Utc};
use event_schema::ImageStatus;
use serde::Serialize;
use sqlx::FromRow;

/// Persisted metadata for one image task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    pub id: String,
    pub filename: String,
    pub description: Option<String>,
    pub status: ImageStatus,
    pub created_at: DateTime<Utc>,
    /// Set only on the transition to `Succeeded`
    pub completed_at: Option<DateTime<Utc>>,
    /// Weak reference; owned by the collection layer
    pub collection_id: Option<String>,
}

/// Input for creating a pending record
#[derive(Debug, Clone)]
pub struct NewImage {
    pub id: String,
    pub filename: String,
    pub description: Option<String>,
    pub collection_id: Option<String>,
}

impl NewImage {
    pub fn new(id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            description: None,
            collection_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn into_pending_record(self, created_at: DateTime<Utc>) -> ImageRecord {
        ImageRecord {
            id: self.id,
            filename: self.filename,
            description: self.description,
            status: ImageStatus::Pending,
            created_at,
            completed_at: None,
            collection_id: self.collection_id,
        }
    }
}

/// Row shape of the `images` table
#[derive(Debug, FromRow)]
pub struct ImageRow {
    pub id: String,
    pub filename: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub collection_id: Option<String>,
}

impl TryFrom<ImageRow> for ImageRecord {
    type Error = AppError;

    fn try_from(row: ImageRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ImageStatus>()
            .map_err(|e| AppError::Serialization(format!("image {}: {e}", row.id)))?;

        Ok(ImageRecord {
            id: row.id,
            filename: row.filename,
            description: row.description,
            status,
            created_at: row.created_at,
            completed_at: row.completed_at,
            collection_id: row.collection_id,
        })
    }
}

/// Result of applying a completion to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    /// The record moved from `Pending` to the requested terminal status
    Applied(ImageStatus),
    /// The record was already terminal; nothing changed
    AlreadyTerminal {
        current: ImageStatus,
        requested: ImageStatus,
    },
    /// No record exists for the id
    Missing,
}

impl TransitionResult {
    /// A terminal status other than the requested one was already recorded
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            TransitionResult::AlreadyTerminal { current, requested } if current != requested
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransitionResult::Applied(_) => "applied",
            TransitionResult::AlreadyTerminal { .. } if self.is_conflict() => "conflict",
            TransitionResult::AlreadyTerminal { .. } => "duplicate",
            TransitionResult::Missing => "missing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> ImageRow {
        ImageRow {
            id: "t1".to_string(),
            filename: "cat.png".to_string(),
            description: None,
            status: status.to_string(),
            created_at: Utc::now(),
            completed_at: None,
            collection_id: None,
        }
    }

    #[test]
    fn test_row_conversion_accepts_legacy_status() {
        let record = ImageRecord::try_from(row("completed")).unwrap();
        assert_eq!(record.status, ImageStatus::Succeeded);
    }

    #[test]
    fn test_row_conversion_rejects_unknown_status() {
        assert!(ImageRecord::try_from(row("archived")).is_err());
    }

    #[test]
    fn test_transition_labels() {
        let duplicate = TransitionResult::AlreadyTerminal {
            current: ImageStatus::Failed,
            requested: ImageStatus::Failed,
        };
        let conflict = TransitionResult::AlreadyTerminal {
            current: ImageStatus::Failed,
            requested: ImageStatus::Succeeded,
        };
        assert_eq!(duplicate.label(), "duplicate");
        assert!(conflict.is_conflict());
        assert_eq!(conflict.label(), "conflict");
        assert_eq!(TransitionResult::Applied(ImageStatus::Succeeded).label(), "applied");
    }
}
