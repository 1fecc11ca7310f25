//! `POST /v1/files`: upload one or many files.
//!
//! Responses differ by protocol: the multi-file protocol always answers with
//! the `{processedFiles, error}` envelope, the legacy protocol answers with
//! the bare file record plus a deprecation header. Errors use the envelope
//! for both.

use crate::{
    errors::UploadError,
    handlers::upload_request::{MultipartForm, parse_upload_request},
    models::{
        context::RequestContext,
        file::FileMetadata,
        upload::{UploadFileResponse, UploadProtocol},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

pub const DEPRECATION_HEADER: &str = "x-deprecation-warning-old-upload-file-method";
const DEPRECATION_MESSAGE: &str =
    "please, update the SDK to leverage new API endpoint or read the API docs to adapt your code";

pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let context = RequestContext::new(state.admin_secret.clone(), headers.clone());

    let parsed = match MultipartForm::read(multipart).await {
        Ok(form) => parse_upload_request(form, &headers, context),
        Err(err) => Err(err),
    };
    let (protocol, request) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return error_response(None, Vec::new(), err),
    };

    match state.uploads.upload(&request).await {
        Ok(files) => {
            info!(
                "uploaded {} file(s) to bucket {}",
                files.len(),
                request.bucket_id
            );
            success_response(protocol, files)
        }
        Err(failure) => error_response(Some(protocol), failure.processed, failure.error),
    }
}

fn success_response(protocol: UploadProtocol, files: Vec<FileMetadata>) -> Response {
    match protocol {
        UploadProtocol::Multi => (
            StatusCode::CREATED,
            Json(UploadFileResponse {
                processed_files: files,
                error: None,
            }),
        )
            .into_response(),
        UploadProtocol::Legacy => {
            let Some(file) = files.into_iter().next() else {
                return error_response(
                    Some(protocol),
                    Vec::new(),
                    UploadError::Internal(anyhow::anyhow!("legacy upload produced no file")),
                );
            };
            let mut response = (StatusCode::CREATED, Json(file)).into_response();
            add_deprecation_header(response.headers_mut());
            response
        }
    }
}

fn error_response(
    protocol: Option<UploadProtocol>,
    processed: Vec<FileMetadata>,
    err: UploadError,
) -> Response {
    let status = err.status();
    if status.is_server_error() {
        error!("problem processing request: {}", err);
    } else {
        warn!("rejected upload request: {}", err);
    }

    let body = UploadFileResponse {
        processed_files: processed,
        error: Some(err.public_response()),
    };
    let mut response = (status, Json(body)).into_response();
    if protocol == Some(UploadProtocol::Legacy) {
        add_deprecation_header(response.headers_mut());
    }
    response
}

fn add_deprecation_header(headers: &mut HeaderMap) {
    headers.insert(
        HeaderName::from_static(DEPRECATION_HEADER),
        HeaderValue::from_static(DEPRECATION_MESSAGE),
    );
}
