//! Multipart parsing for `POST /v1/files`.
//!
//! The whole form is read up front. The protocol is then picked from which
//! file part is present:
//! - `file[]` → multi-file protocol (`metadata[]`, `bucket-id` form values)
//! - `file`   → legacy single-file protocol (`x-nhost-*` headers)

use crate::{
    errors::UploadError,
    models::{
        bucket::DEFAULT_BUCKET_ID,
        context::RequestContext,
        upload::{FileData, FileMetadataInput, FilePart, UploadProtocol, UploadRequest},
    },
};
use axum::{extract::Multipart, http::HeaderMap};
use std::collections::HashMap;
use uuid::Uuid;

pub const MULTI_FILE_PART: &str = "file[]";
pub const LEGACY_FILE_PART: &str = "file";
pub const METADATA_VALUE: &str = "metadata[]";
pub const BUCKET_ID_VALUE: &str = "bucket-id";

pub const BUCKET_ID_HEADER: &str = "x-nhost-bucket-id";
pub const FILE_NAME_HEADER: &str = "x-nhost-file-name";
pub const FILE_ID_HEADER: &str = "x-nhost-file-id";

/// A fully buffered multipart form: parts with a filename are files, the
/// rest are text values. Repeated names keep their order.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub files: HashMap<String, Vec<FilePart>>,
    pub values: HashMap<String, Vec<String>>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, UploadError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;
                    form.add_file(
                        name,
                        FilePart {
                            filename,
                            content_type,
                            data,
                        },
                    );
                }
                None => {
                    let value = field.text().await?;
                    form.add_value(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn add_file(&mut self, name: impl Into<String>, part: FilePart) {
        self.files.entry(name.into()).or_default().push(part);
    }

    pub fn add_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    /// Which protocol the form was written for, if any.
    pub fn protocol(&self) -> Option<UploadProtocol> {
        if self.has_files(MULTI_FILE_PART) {
            Some(UploadProtocol::Multi)
        } else if self.has_files(LEGACY_FILE_PART) {
            Some(UploadProtocol::Legacy)
        } else {
            None
        }
    }

    fn has_files(&self, name: &str) -> bool {
        self.files.get(name).is_some_and(|parts| !parts.is_empty())
    }

    fn first_value(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Detect the protocol and build the normalized request.
pub fn parse_upload_request(
    mut form: MultipartForm,
    headers: &HeaderMap,
    context: RequestContext,
) -> Result<(UploadProtocol, UploadRequest), UploadError> {
    let protocol = form.protocol().ok_or(UploadError::MissingFilePart)?;
    let request = match protocol {
        UploadProtocol::Multi => parse_multi(&mut form, context)?,
        UploadProtocol::Legacy => parse_legacy(&mut form, headers, context),
    };
    Ok((protocol, request))
}

fn parse_multi(
    form: &mut MultipartForm,
    context: RequestContext,
) -> Result<UploadRequest, UploadError> {
    let parts = form.files.remove(MULTI_FILE_PART).unwrap_or_default();
    let metadata = form.values.get(METADATA_VALUE);

    if let Some(entries) = metadata {
        if entries.len() != parts.len() {
            return Err(UploadError::MetadataLength {
                files: parts.len(),
                metadata: entries.len(),
            });
        }
    }

    let mut files = Vec::with_capacity(parts.len());
    for (idx, part) in parts.into_iter().enumerate() {
        let input = match metadata.and_then(|entries| entries.get(idx)) {
            Some(raw) => serde_json::from_str::<FileMetadataInput>(raw)
                .map_err(UploadError::WrongMetadataFormat)?,
            None => FileMetadataInput::default(),
        };
        files.push(file_data(input.name, input.id, part));
    }

    let bucket_id = form
        .first_value(BUCKET_ID_VALUE)
        .unwrap_or(DEFAULT_BUCKET_ID)
        .to_string();

    Ok(UploadRequest {
        bucket_id,
        files,
        context,
    })
}

fn parse_legacy(
    form: &mut MultipartForm,
    headers: &HeaderMap,
    context: RequestContext,
) -> UploadRequest {
    let part = form
        .files
        .remove(LEGACY_FILE_PART)
        .and_then(|parts| parts.into_iter().next());

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let bucket_id = header(BUCKET_ID_HEADER).unwrap_or_else(|| DEFAULT_BUCKET_ID.to_string());
    let files = part
        .map(|part| vec![file_data(header(FILE_NAME_HEADER), header(FILE_ID_HEADER), part)])
        .unwrap_or_default();

    UploadRequest {
        bucket_id,
        files,
        context,
    }
}

/// Fill in the name from the part's filename and the id with a fresh UUID
/// when the caller left them out.
fn file_data(name: Option<String>, id: Option<String>, part: FilePart) -> FileData {
    let name = name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| part.filename.clone());
    let id = id
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    FileData { name, id, part }
}
