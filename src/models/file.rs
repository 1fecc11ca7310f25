//! Represents the registry's view of a stored file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata record for a single uploaded file.
///
/// Records are created in two phases: pre-registration leaves `is_uploaded`
/// false with an empty `etag`, finalize fills in the content-store ETag and
/// flips the flag once the bytes are stored.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,

    /// Display name, defaults to the uploaded part's filename.
    pub name: String,

    /// Size in bytes of what was stored (the re-encoded size for images).
    pub size: i64,

    pub bucket_id: String,

    /// ETag returned by the content store, empty until finalized.
    pub etag: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub is_uploaded: bool,

    /// Resolved content type (MIME).
    pub mime_type: String,

    /// Caller identity forwarded in `x-hasura-user-id`, if any.
    pub uploaded_by_user_id: Option<String>,

    /// Visual fingerprint for images, empty for everything else.
    pub blurhash: String,
}
