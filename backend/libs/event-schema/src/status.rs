//! Image record status model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of an image record
///
/// `Pending` is assigned at creation. `Succeeded` and `Failed` are terminal:
/// the only edges are `Pending -> Succeeded` and `Pending -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    #[serde(alias = "completed")]
    Succeeded,
    Failed,
}

impl ImageStatus {
    /// Canonical storage value
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::Pending => "pending",
            ImageStatus::Succeeded => "succeeded",
            ImageStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            ImageStatus::Pending => false,
            ImageStatus::Succeeded | ImageStatus::Failed => true,
        }
    }

    pub fn can_transition_to(&self, next: ImageStatus) -> bool {
        match (self, next) {
            (ImageStatus::Pending, ImageStatus::Succeeded) => true,
            (ImageStatus::Pending, ImageStatus::Failed) => true,
            (ImageStatus::Pending, ImageStatus::Pending) => false,
            (ImageStatus::Succeeded, _) | (ImageStatus::Failed, _) => false,
        }
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown image status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for ImageStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImageStatus::Pending),
            // "completed" was written by older API builds
            "succeeded" | "completed" => Ok(ImageStatus::Succeeded),
            "failed" => Ok(ImageStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}
