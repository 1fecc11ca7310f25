//! Represents a bucket: a named policy scope for uploaded files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Name of the bucket used when the caller does not pick one.
pub const DEFAULT_BUCKET_ID: &str = "default";

/// A storage bucket as seen by the upload path.
///
/// Buckets are owned by the metadata registry; the gateway only reads the
/// size policy.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Bucket identifier, e.g. `default`.
    pub id: String,

    /// Smallest accepted file size in bytes (inclusive).
    pub min_upload_file_size: i64,

    /// Largest accepted file size in bytes (inclusive).
    pub max_upload_file_size: i64,

    /// When this bucket was created.
    pub created_at: DateTime<Utc>,
}
