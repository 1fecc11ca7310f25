//! Request and response shapes for the upload endpoint.

use crate::{errors::ErrorResponse, models::context::RequestContext, models::file::FileMetadata};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Which wire protocol the caller used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadProtocol {
    /// Repeated `file[]` parts with optional `metadata[]` and `bucket-id`.
    Multi,
    /// A single `file` part configured through `x-nhost-*` headers.
    Legacy,
}

/// One file part as received in the multipart body.
#[derive(Clone, Debug)]
pub struct FilePart {
    /// Filename from the part's `Content-Disposition`.
    pub filename: String,

    /// `Content-Type` declared on the part, if any.
    pub content_type: Option<String>,

    pub data: Bytes,
}

impl FilePart {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A file to upload together with its caller-facing name and id.
#[derive(Clone, Debug)]
pub struct FileData {
    pub name: String,
    pub id: String,
    pub part: FilePart,
}

/// Per-file entry of the `metadata[]` form value.
#[derive(Debug, Default, Deserialize)]
pub struct FileMetadataInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Normalized upload request, identical for both protocols.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub bucket_id: String,
    pub files: Vec<FileData>,
    pub context: RequestContext,
}

/// Envelope returned by the multi-file protocol and by every error.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileResponse {
    pub processed_files: Vec<FileMetadata>,
    pub error: Option<ErrorResponse>,
}
