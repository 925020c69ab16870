/// Message schemas for the image processing topics
///
/// The task topic carries `TaskMessage`, the completion topic carries
/// `CompletionMessage`. Both are JSON, keyed by the image id.
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub mod status;

pub use status::{ImageStatus, ParseStatusError};

/// Default topic names, overridable through configuration
pub mod topics {
    pub const IMAGE_TASKS: &str = "image.tasks";
    pub const IMAGE_COMPLETED: &str = "image.completed";
}

/// Request to transform the staged image stored under `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMessage {
    /// Legacy producers wrote `uuid`
    #[serde(alias = "uuid")]
    pub id: String,
    /// Epoch milliseconds at enqueue time
    pub start_time: i64,
}

impl TaskMessage {
    /// Create a task stamped with the current time
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start_time: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_start_time(id: impl Into<String>, start_time: i64) -> Self {
        Self {
            id: id.into(),
            start_time,
        }
    }

    /// Milliseconds elapsed between `start_time` and `now_ms`, never negative
    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.start_time).max(0)
    }
}

/// Result of a transformation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMessage {
    #[serde(alias = "uuid")]
    pub id: String,
    pub success: bool,
    pub processing_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompletionMessage {
    pub fn succeeded(id: impl Into<String>, processing_time: i64) -> Self {
        Self {
            id: id.into(),
            success: true,
            processing_time,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, processing_time: i64, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            processing_time,
            error: Some(error.into()),
        }
    }

    /// Terminal status this message moves the image record to
    pub fn target_status(&self) -> ImageStatus {
        if self.success {
            ImageStatus::Succeeded
        } else {
            ImageStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_message_wire_format() {
        let task = TaskMessage::with_start_time("t1", 1000);
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value, json!({"id": "t1", "startTime": 1000}));
    }

    #[test]
    fn test_task_message_accepts_legacy_uuid_field() {
        let task: TaskMessage =
            serde_json::from_str(r#"{"uuid":"abc","startTime":42}"#).unwrap();
        assert_eq!(task.id, "abc");
        assert_eq!(task.start_time, 42);
    }

    #[test]
    fn test_successful_completion_omits_error() {
        let msg = CompletionMessage::succeeded("t1", 15);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"id": "t1", "success": true, "processingTime": 15})
        );
        assert_eq!(msg.target_status(), ImageStatus::Succeeded);
    }

    #[test]
    fn test_failed_completion_carries_error() {
        let raw = r#"{"id":"t2","success":false,"processingTime":7,"error":"not found"}"#;
        let msg: CompletionMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg, CompletionMessage::failed("t2", 7, "not found"));
        assert_eq!(msg.target_status(), ImageStatus::Failed);
    }

    #[test]
    fn test_elapsed_ms_clamps_clock_skew() {
        let task = TaskMessage::with_start_time("t1", 5_000);
        assert_eq!(task.elapsed_ms(5_250), 250);
        assert_eq!(task.elapsed_ms(4_000), 0);
    }
}
