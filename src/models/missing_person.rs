use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Where a report's photo is in the asynchronous publishing pipeline.
///
/// `Pending -> Processing -> Ready | Failed`. `Ready` and `Failed` are
/// terminal for the worker; only an explicit requeue moves `Failed` back to
/// `Pending`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl ImageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageStatus::Pending => "pending",
            ImageStatus::Processing => "processing",
            ImageStatus::Ready => "ready",
            ImageStatus::Failed => "failed",
        }
    }
}

/// A missing person report as stored in `missing_persons`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingPerson {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub description: String,
    pub last_seen: String,
    pub contact: String,
    /// Staged local filename until the worker publishes the photo, then the
    /// public URL.
    pub photo_reference: String,
    pub image_status: ImageStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the API when a report is filed.
#[derive(Debug, Clone)]
pub struct NewMissingPerson {
    pub name: String,
    pub age: i32,
    pub description: String,
    pub last_seen: String,
    pub contact: String,
    pub photo_reference: String,
}
