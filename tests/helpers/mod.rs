//! Shared setup for integration tests: the real router over an in-memory
//! SQLite registry and a temporary content directory.

#![allow(dead_code)]

use axum_test::TestServer;
use image::{ImageFormat, Rgb, RgbImage};
use sqlx::sqlite::SqlitePoolOptions;
use std::{io::Cursor, sync::Arc};
use tempfile::TempDir;
use upload_gateway::{
    routes,
    services::{
        content_store::DiskContentStore, image_transcoder::ImageTranscoder,
        registry::SqliteRegistry, upload_service::UploadService,
    },
    state::AppState,
};

pub const ADMIN_SECRET: &str = "test-admin-secret";

pub struct TestApp {
    pub server: TestServer,
    pub registry: SqliteRegistry,
    // kept alive for the duration of the test
    pub storage_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Set the default bucket's size policy.
    pub async fn set_bucket_limits(&self, min: i64, max: i64) {
        sqlx::query(
            "UPDATE buckets SET min_upload_file_size = ?, max_upload_file_size = ?
             WHERE id = 'default'",
        )
        .bind(min)
        .bind(max)
        .execute(&*self.registry.db)
        .await
        .expect("Failed to update bucket limits");
    }

    pub async fn file_count(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files")
            .fetch_one(&*self.registry.db)
            .await
            .expect("Failed to count files")
    }
}

pub async fn setup_test_app() -> TestApp {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    let registry = SqliteRegistry::new(Arc::new(pool), Some(ADMIN_SECRET.to_string()));
    registry.migrate().await.expect("Failed to migrate");

    let storage_dir = tempfile::tempdir().expect("Failed to create storage dir");
    let uploads = UploadService::new(
        Arc::new(registry.clone()),
        Arc::new(DiskContentStore::new(storage_dir.path())),
        ImageTranscoder::default(),
    );
    let state = AppState {
        uploads,
        admin_secret: Some(ADMIN_SECRET.to_string()),
    };

    let app = routes::routes(10 * 1024 * 1024).with_state(state);
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        registry,
        storage_dir,
    }
}

/// A small PNG with some colour variation.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 64])
    });
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .expect("Failed to encode PNG");
    buffer
}
