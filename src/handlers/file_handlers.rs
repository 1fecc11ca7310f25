//! `GET /v1/files/{id}`: stream a finalized file back to the caller.

use crate::{errors::AppError, models::context::RequestContext, state::AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let ctx = RequestContext::new(state.admin_secret.clone(), headers);
    let meta = state.uploads.registry().get_file_by_id(&ctx, &file_id).await?;
    if !meta.is_uploaded {
        return Err(AppError::not_found(format!("file `{}` not found", file_id)));
    }

    let reader = state.uploads.store().get_file(&file_id).await?;
    let mut response = Response::new(Body::from_stream(ReaderStream::new(reader)));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size.max(0)));
    if let Ok(value) = HeaderValue::from_str(&meta.etag) {
        headers.insert(header::ETAG, value);
    }

    Ok(response)
}
