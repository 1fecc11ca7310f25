//! Content store: binary payloads addressed by file id.
//!
//! [`DiskContentStore`] keeps payloads on local disk, sharded beneath
//! `base_path/{shard}/{shard}/{file_id}` and written through a temp file,
//! fsync and atomic rename. ETags are quoted MD5 hex digests.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncWriteExt},
};
use tracing::debug;
use uuid::Uuid;

const MAX_FILE_ID_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("file `{0}` not found in content store")]
    NotFound(String),
    #[error("invalid file id `{0}`")]
    InvalidFileId(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ContentStoreResult<T> = Result<T, ContentStoreError>;

/// Readable payload handed back by [`ContentStore::get_file`].
pub type FileReader = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `data` under `file_id`, replacing any previous payload, and
    /// return the ETag of what was written.
    async fn put_file(
        &self,
        file_id: &str,
        content_type: &str,
        data: Bytes,
    ) -> ContentStoreResult<String>;

    async fn get_file(&self, file_id: &str) -> ContentStoreResult<FileReader>;

    /// Best-effort write/read/delete round trip used by the readiness probe.
    async fn probe(&self) -> ContentStoreResult<()> {
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct DiskContentStore {
    /// Base directory on disk where payloads are stored.
    pub base_path: PathBuf,
}

impl DiskContentStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Reject ids that could escape the storage directory.
    fn ensure_id_safe(&self, file_id: &str) -> ContentStoreResult<()> {
        let invalid = file_id.is_empty()
            || file_id.len() > MAX_FILE_ID_LEN
            || file_id == "."
            || file_id.contains("..")
            || file_id
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\');
        if invalid {
            return Err(ContentStoreError::InvalidFileId(file_id.to_string()));
        }
        Ok(())
    }

    /// Two-level shard directories derived from MD5(file_id), so no single
    /// directory grows unbounded.
    fn shards(file_id: &str) -> (String, String) {
        let digest = md5::compute(file_id);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn file_path(&self, file_id: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(file_id);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(file_id);
        path
    }

    async fn write_atomically(&self, file_path: &Path, data: &[u8]) -> io::Result<()> {
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("file path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, file_path).await
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        result
    }
}

#[async_trait]
impl ContentStore for DiskContentStore {
    async fn put_file(
        &self,
        file_id: &str,
        content_type: &str,
        data: Bytes,
    ) -> ContentStoreResult<String> {
        self.ensure_id_safe(file_id)?;
        let file_path = self.file_path(file_id);
        self.write_atomically(&file_path, &data).await?;

        let etag = format!("\"{:x}\"", md5::compute(&data));
        debug!(
            "stored {} ({}, {} bytes) at {}",
            file_id,
            content_type,
            data.len(),
            file_path.display()
        );
        Ok(etag)
    }

    async fn get_file(&self, file_id: &str) -> ContentStoreResult<FileReader> {
        self.ensure_id_safe(file_id)?;
        let file_path = self.file_path(file_id);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ContentStoreError::NotFound(file_id.to_string())
            } else {
                ContentStoreError::Io(err)
            }
        })?;
        Ok(Box::new(file))
    }

    async fn probe(&self) -> ContentStoreResult<()> {
        let tmp_path = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await?;
        let read_back = fs::read(&tmp_path).await;
        // best-effort cleanup
        let _ = fs::remove_file(&tmp_path).await;
        if read_back? != b"readyz" {
            return Err(ContentStoreError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "file content mismatch",
            )));
        }
        Ok(())
    }
}
