//! Metadata registry: the system of record for buckets and file metadata.
//!
//! The upload path talks to the registry only through [`MetadataRegistry`].
//! [`SqliteRegistry`] is the bundled implementation, backed by SQLite.

use crate::models::{
    bucket::Bucket,
    context::{ADMIN_SECRET_HEADER, RequestContext},
    file::FileMetadata,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Schema and seed data, applied statement by statement.
pub const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("file `{0}` not found")]
    FileNotFound(String),
    #[error("file `{0}` already exists")]
    FileAlreadyExists(String),
    #[error("admin secret missing or invalid")]
    Unauthorized,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Fields written when a file is pre-registered, before its bytes are stored.
#[derive(Clone, Debug, PartialEq)]
pub struct NewFile {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub bucket_id: String,
    pub mime_type: String,
}

/// Fields written when a pre-registered file is finalized.
#[derive(Clone, Debug, PartialEq)]
pub struct FileUpdate {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub bucket_id: String,
    pub etag: String,
    pub is_uploaded: bool,
    pub mime_type: String,
    pub blurhash: String,
}

#[async_trait]
pub trait MetadataRegistry: Send + Sync {
    async fn get_bucket_by_id(
        &self,
        ctx: &RequestContext,
        bucket_id: &str,
    ) -> RegistryResult<Bucket>;

    /// Create the record for a file whose bytes are not stored yet.
    async fn initialize_file(&self, ctx: &RequestContext, file: NewFile) -> RegistryResult<()>;

    /// Overwrite a pre-registered record. Calling it twice with the same
    /// update leaves the same record.
    async fn populate_metadata(
        &self,
        ctx: &RequestContext,
        update: FileUpdate,
    ) -> RegistryResult<FileMetadata>;

    async fn delete_file_by_id(&self, ctx: &RequestContext, file_id: &str) -> RegistryResult<()>;

    async fn get_file_by_id(
        &self,
        ctx: &RequestContext,
        file_id: &str,
    ) -> RegistryResult<FileMetadata>;

    /// Cheap connectivity check used by the readiness probe.
    async fn ping(&self) -> RegistryResult<()> {
        Ok(())
    }
}

const FILE_COLUMNS: &str = "id, name, size, bucket_id, etag, created_at, updated_at, \
                            is_uploaded, mime_type, uploaded_by_user_id, blurhash";

/// Registry backed by a SQLite pool.
///
/// When built with an admin secret, every call must present the same secret
/// through its [`RequestContext`].
#[derive(Clone)]
pub struct SqliteRegistry {
    pub db: Arc<SqlitePool>,
    admin_secret: Option<String>,
}

impl SqliteRegistry {
    pub fn new(db: Arc<SqlitePool>, admin_secret: Option<String>) -> Self {
        Self { db, admin_secret }
    }

    /// Apply the embedded schema. Safe to run on every start.
    pub async fn migrate(&self) -> RegistryResult<()> {
        let statements = MIGRATION_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        debug!("Running {} migration statements", statements.len());

        for stmt in statements {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    fn authorize(&self, ctx: &RequestContext) -> RegistryResult<()> {
        let Some(expected) = self.admin_secret.as_deref() else {
            return Ok(());
        };
        let headers = ctx.registry_headers();
        let presented = headers
            .get(ADMIN_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented == Some(expected) {
            Ok(())
        } else {
            Err(RegistryError::Unauthorized)
        }
    }
}

#[async_trait]
impl MetadataRegistry for SqliteRegistry {
    async fn get_bucket_by_id(
        &self,
        ctx: &RequestContext,
        bucket_id: &str,
    ) -> RegistryResult<Bucket> {
        self.authorize(ctx)?;
        sqlx::query_as::<_, Bucket>(
            "SELECT id, min_upload_file_size, max_upload_file_size, created_at
             FROM buckets WHERE id = ?",
        )
        .bind(bucket_id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => RegistryError::BucketNotFound(bucket_id.to_string()),
            other => RegistryError::Sqlx(other),
        })
    }

    async fn initialize_file(&self, ctx: &RequestContext, file: NewFile) -> RegistryResult<()> {
        self.authorize(ctx)?;
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO files (
                id, name, size, bucket_id, etag, created_at, updated_at,
                is_uploaded, mime_type, uploaded_by_user_id, blurhash
            ) VALUES (?, ?, ?, ?, '', ?, ?, 0, ?, ?, '')",
        )
        .bind(&file.id)
        .bind(&file.name)
        .bind(file.size)
        .bind(&file.bucket_id)
        .bind(now)
        .bind(now)
        .bind(&file.mime_type)
        .bind(ctx.user_id())
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RegistryError::FileAlreadyExists(file.id)),
            Err(err) => Err(RegistryError::Sqlx(err)),
        }
    }

    async fn populate_metadata(
        &self,
        ctx: &RequestContext,
        update: FileUpdate,
    ) -> RegistryResult<FileMetadata> {
        self.authorize(ctx)?;
        let sql = format!(
            "UPDATE files SET
                name = ?, size = ?, bucket_id = ?, etag = ?, is_uploaded = ?,
                mime_type = ?, blurhash = ?, updated_at = ?
             WHERE id = ?
             RETURNING {}",
            FILE_COLUMNS
        );
        sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(&update.name)
            .bind(update.size)
            .bind(&update.bucket_id)
            .bind(&update.etag)
            .bind(update.is_uploaded)
            .bind(&update.mime_type)
            .bind(&update.blurhash)
            .bind(Utc::now())
            .bind(&update.id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => RegistryError::FileNotFound(update.id.clone()),
                other => RegistryError::Sqlx(other),
            })
    }

    async fn delete_file_by_id(&self, ctx: &RequestContext, file_id: &str) -> RegistryResult<()> {
        self.authorize(ctx)?;
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(file_id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::FileNotFound(file_id.to_string()));
        }
        Ok(())
    }

    async fn get_file_by_id(
        &self,
        ctx: &RequestContext,
        file_id: &str,
    ) -> RegistryResult<FileMetadata> {
        self.authorize(ctx)?;
        let sql = format!("SELECT {} FROM files WHERE id = ?", FILE_COLUMNS);
        sqlx::query_as::<_, FileMetadata>(&sql)
            .bind(file_id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => RegistryError::FileNotFound(file_id.to_string()),
                other => RegistryError::Sqlx(other),
            })
    }

    async fn ping(&self) -> RegistryResult<()> {
        let v = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if v != 1 {
            return Err(RegistryError::Sqlx(sqlx::Error::Protocol(format!(
                "unexpected result: {}",
                v
            ))));
        }
        Ok(())
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
