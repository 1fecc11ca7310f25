use crate::services::{
    content_store::ContentStoreError, image_transcoder::TranscodeError, registry::RegistryError,
};
use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

const INTERNAL_MESSAGE: &str = "an internal server error occurred";

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::FileNotFound(_) | RegistryError::BucketNotFound(_) => {
                AppError::not_found(err.to_string())
            }
            RegistryError::Unauthorized => AppError::new(StatusCode::FORBIDDEN, err.to_string()),
            RegistryError::FileAlreadyExists(_) => {
                AppError::new(StatusCode::CONFLICT, err.to_string())
            }
            other => {
                tracing::error!("registry failure: {}", other);
                AppError::internal(INTERNAL_MESSAGE)
            }
        }
    }
}

impl From<ContentStoreError> for AppError {
    fn from(err: ContentStoreError) -> Self {
        match err {
            ContentStoreError::NotFound(_) => AppError::not_found(err.to_string()),
            ContentStoreError::InvalidFileId(_) => {
                AppError::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            other => {
                tracing::error!("content store failure: {}", other);
                AppError::internal(INTERNAL_MESSAGE)
            }
        }
    }
}

/// Everything that can abort an upload request, from parsing to finalize.
///
/// Each kind carries a stable status code and a public message. Internal
/// kinds hide their details from the caller; the full chain is logged by the
/// handler.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file {name} is too small: {size} bytes, minimum allowed is {min} bytes")]
    FileTooSmall { name: String, size: u64, min: u64 },

    #[error("file {name} is too big: {size} bytes, maximum allowed is {max} bytes")]
    FileTooBig { name: String, size: u64, max: u64 },

    #[error("wrong metadata format: {0}")]
    WrongMetadataFormat(#[source] serde_json::Error),

    #[error("number of metadata entries ({metadata}) does not match number of files ({files})")]
    MetadataLength { files: usize, metadata: usize },

    #[error("multipart form contains neither a `file[]` nor a `file` part")]
    MissingFilePart,

    #[error("problem reading multipart form: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    ContentStore(#[from] ContentStoreError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<UploadError>,
    },
}

impl UploadError {
    /// Prefix the error with `context` without changing its kind.
    pub fn context(self, context: impl Into<String>) -> Self {
        UploadError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::FileTooSmall { .. }
            | UploadError::FileTooBig { .. }
            | UploadError::WrongMetadataFormat(_)
            | UploadError::MetadataLength { .. }
            | UploadError::MissingFilePart => StatusCode::BAD_REQUEST,
            UploadError::Multipart(err) => err.status(),
            UploadError::Registry(RegistryError::BucketNotFound(_))
            | UploadError::Registry(RegistryError::FileNotFound(_)) => StatusCode::NOT_FOUND,
            UploadError::Registry(RegistryError::Unauthorized) => StatusCode::FORBIDDEN,
            UploadError::Registry(RegistryError::FileAlreadyExists(_)) => StatusCode::CONFLICT,
            UploadError::ContentStore(ContentStoreError::InvalidFileId(_)) => {
                StatusCode::BAD_REQUEST
            }
            UploadError::Registry(_)
            | UploadError::ContentStore(_)
            | UploadError::Transcode(_)
            | UploadError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::WithContext { source, .. } => source.status(),
        }
    }

    /// Structured details attached to the public error, if any.
    pub fn data(&self) -> Option<Value> {
        match self {
            UploadError::FileTooSmall { name, size, min } => Some(json!({
                "file": name,
                "size": size,
                "minSize": min,
            })),
            UploadError::FileTooBig { name, size, max } => Some(json!({
                "file": name,
                "size": size,
                "maxSize": max,
            })),
            UploadError::MetadataLength { files, metadata } => Some(json!({
                "files": files,
                "metadata": metadata,
            })),
            UploadError::WithContext { source, .. } => source.data(),
            _ => None,
        }
    }

    /// The body sent to the caller. Server-side failures collapse into a
    /// generic message.
    pub fn public_response(&self) -> ErrorResponse {
        let message = if self.status().is_server_error() {
            INTERNAL_MESSAGE.to_string()
        } else {
            self.public_message()
        };
        ErrorResponse {
            message,
            data: self.data(),
        }
    }

    fn public_message(&self) -> String {
        match self {
            // context annotations are for logs only
            UploadError::WithContext { source, .. } => source.public_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
