//! UploadService drives every file of an upload request through size
//! policy, content-type resolution, optional image transcoding and the
//! two-phase registry/content-store commit.
//!
//! Files are processed one after another. The first failure stops the batch;
//! files committed before it stay committed and are reported back.

use crate::{
    errors::UploadError,
    models::{
        bucket::Bucket,
        context::RequestContext,
        file::FileMetadata,
        upload::{FileData, UploadRequest},
    },
    services::{
        content_store::ContentStore,
        content_type,
        image_transcoder::{ImageTranscoder, WEBP},
        registry::{FileUpdate, MetadataRegistry, NewFile},
    },
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a batch that stopped early.
#[derive(Debug)]
pub struct UploadFailure {
    /// Files that were fully committed before the failure, in request order.
    pub processed: Vec<FileMetadata>,
    pub error: UploadError,
}

#[derive(Clone)]
pub struct UploadService {
    registry: Arc<dyn MetadataRegistry>,
    store: Arc<dyn ContentStore>,
    transcoder: ImageTranscoder,
}

impl UploadService {
    pub fn new(
        registry: Arc<dyn MetadataRegistry>,
        store: Arc<dyn ContentStore>,
        transcoder: ImageTranscoder,
    ) -> Self {
        Self {
            registry,
            store,
            transcoder,
        }
    }

    pub fn registry(&self) -> &Arc<dyn MetadataRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Upload every file in `request` into its target bucket.
    ///
    /// The bucket is looked up once and shared by the whole batch.
    pub async fn upload(
        &self,
        request: &UploadRequest,
    ) -> Result<Vec<FileMetadata>, UploadFailure> {
        let ctx = &request.context;
        let bucket = self
            .registry
            .get_bucket_by_id(ctx, &request.bucket_id)
            .await
            .map_err(|err| UploadFailure {
                processed: Vec::new(),
                error: err.into(),
            })?;

        let mut processed = Vec::with_capacity(request.files.len());
        for file in &request.files {
            match self.upload_file(ctx, &bucket, file).await {
                Ok(metadata) => processed.push(metadata),
                Err(error) => return Err(UploadFailure { processed, error }),
            }
        }

        Ok(processed)
    }

    async fn upload_file(
        &self,
        ctx: &RequestContext,
        bucket: &Bucket,
        file: &FileData,
    ) -> Result<FileMetadata, UploadError> {
        check_file_size(&file.name, file.part.size(), bucket)?;

        let (mut data, mut mime_type) = content_type::resolve(&file.part);
        let mut blurhash = String::new();

        if ImageTranscoder::is_transcodable(&mime_type) {
            let transcoded = self
                .transcoder
                .transcode_blocking(data)
                .await
                .map_err(|err| {
                    UploadError::from(err)
                        .context(format!("problem transcoding image {}", file.name))
                })?;
            data = transcoded.data;
            blurhash = transcoded.blurhash;
            mime_type = WEBP.to_string();
        }

        let size = data.len() as i64;
        debug!(
            "uploading {} ({}) as {}, {} bytes",
            file.name, file.id, mime_type, size
        );

        self.registry
            .initialize_file(
                ctx,
                NewFile {
                    id: file.id.clone(),
                    name: file.name.clone(),
                    size,
                    bucket_id: bucket.id.clone(),
                    mime_type: mime_type.clone(),
                },
            )
            .await
            .map_err(|err| {
                UploadError::from(err).context(format!("problem initializing file {}", file.name))
            })?;

        let etag = match self.store.put_file(&file.id, &mime_type, data).await {
            Ok(etag) => etag,
            Err(err) => {
                if let Err(delete_err) = self.registry.delete_file_by_id(ctx, &file.id).await {
                    warn!(
                        "could not remove metadata for {} after failed store write: {}",
                        file.id, delete_err
                    );
                }
                return Err(UploadError::from(err).context("problem uploading file to storage"));
            }
        };

        self.registry
            .populate_metadata(
                ctx,
                FileUpdate {
                    id: file.id.clone(),
                    name: file.name.clone(),
                    size,
                    bucket_id: bucket.id.clone(),
                    etag,
                    is_uploaded: true,
                    mime_type,
                    blurhash,
                },
            )
            .await
            .map_err(|err| {
                UploadError::from(err)
                    .context(format!("problem populating file metadata for file {}", file.name))
            })
    }
}

/// Enforce the bucket's size policy. Both bounds are inclusive.
pub fn check_file_size(name: &str, size: u64, bucket: &Bucket) -> Result<(), UploadError> {
    let min = bucket.min_upload_file_size.max(0) as u64;
    let max = bucket.max_upload_file_size.max(0) as u64;
    if size < min {
        Err(UploadError::FileTooSmall {
            name: name.to_string(),
            size,
            min,
        })
    } else if size > max {
        Err(UploadError::FileTooBig {
            name: name.to_string(),
            size,
            max,
        })
    } else {
        Ok(())
    }
}
