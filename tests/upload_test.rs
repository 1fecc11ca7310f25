//! Upload API integration tests.
//!
//! Run with: `cargo test --test upload_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::{create_test_png, setup_test_app};
use serde_json::Value;

const DEPRECATION_HEADER: &str = "x-deprecation-warning-old-upload-file-method";

fn text_part(filename: &str, body: &str) -> Part {
    Part::bytes(body.as_bytes().to_vec())
        .file_name(filename)
        .mime_type("text/plain")
}

#[tokio::test]
async fn test_multi_file_upload() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_text("bucket-id", "default")
        .add_part("file[]", text_part("a.txt", "hello"))
        .add_part("file[]", text_part("b.txt", "world!"))
        .add_text(
            "metadata[]",
            r#"{"name":"first.txt","id":"11111111-1111-1111-1111-111111111111"}"#,
        )
        .add_text("metadata[]", r#"{}"#);

    let response = app.client().post("/v1/files").multipart(form).await;
    assert_eq!(response.status_code(), 201);
    assert!(response.maybe_header(DEPRECATION_HEADER).is_none());

    let body: Value = response.json();
    assert!(body["error"].is_null());
    let files = body["processedFiles"].as_array().expect("processedFiles array");
    assert_eq!(files.len(), 2);

    assert_eq!(files[0]["id"], "11111111-1111-1111-1111-111111111111");
    assert_eq!(files[0]["name"], "first.txt");
    assert_eq!(files[0]["size"], 5);
    assert_eq!(files[0]["mimeType"], "text/plain");
    assert_eq!(files[0]["isUploaded"], true);
    assert_eq!(files[0]["blurhash"], "");
    assert_eq!(files[0]["bucketId"], "default");

    assert_eq!(files[1]["name"], "b.txt");
    assert_eq!(files[1]["size"], 6);
    assert!(uuid::Uuid::parse_str(files[1]["id"].as_str().unwrap()).is_ok());

    assert_eq!(app.file_count().await, 2);
}

#[tokio::test]
async fn test_single_file_new_protocol_is_still_wrapped() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part("file[]", text_part("solo.txt", "solo"));
    let response = app.client().post("/v1/files").multipart(form).await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["processedFiles"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_legacy_upload_returns_bare_object() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part("file", text_part("legacy.txt", "old school"));
    let response = app.client().post("/v1/files").multipart(form).await;

    assert_eq!(response.status_code(), 201);
    assert!(response.maybe_header(DEPRECATION_HEADER).is_some());

    let body: Value = response.json();
    assert!(body.get("processedFiles").is_none());
    assert_eq!(body["name"], "legacy.txt");
    assert_eq!(body["bucketId"], "default");
    assert_eq!(body["isUploaded"], true);
    assert!(uuid::Uuid::parse_str(body["id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_legacy_upload_honours_headers() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part("file", text_part("legacy.txt", "payload"));
    let response = app
        .client()
        .post("/v1/files")
        .add_header("x-nhost-file-name", "custom.txt")
        .add_header("x-nhost-file-id", "22222222-2222-2222-2222-222222222222")
        .add_header("x-hasura-user-id", "user-7")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["name"], "custom.txt");
    assert_eq!(body["id"], "22222222-2222-2222-2222-222222222222");
    assert_eq!(body["uploadedByUserId"], "user-7");
}

#[tokio::test]
async fn test_legacy_errors_keep_deprecation_header() {
    let app = setup_test_app().await;
    app.set_bucket_limits(1, 4).await;

    let form = MultipartForm::new().add_part("file", text_part("legacy.txt", "too long"));
    let response = app.client().post("/v1/files").multipart(form).await;
    assert_eq!(response.status_code(), 400);
    assert!(response.maybe_header(DEPRECATION_HEADER).is_some());
    let body: Value = response.json();
    assert_eq!(body["error"]["data"]["maxSize"], 4);

    let form = MultipartForm::new().add_part("file", text_part("legacy.txt", "ok"));
    let response = app
        .client()
        .post("/v1/files")
        .add_header("x-nhost-bucket-id", "missing")
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 404);
    assert!(response.maybe_header(DEPRECATION_HEADER).is_some());
    assert_eq!(app.file_count().await, 0);
}

#[tokio::test]
async fn test_metadata_count_mismatch_is_rejected() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part("file[]", text_part("a.txt", "a"))
        .add_part("file[]", text_part("b.txt", "b"))
        .add_text("metadata[]", r#"{"name":"only-one"}"#);

    let response = app.client().post("/v1/files").multipart(form).await;
    assert_eq!(response.status_code(), 400);

    let body: Value = response.json();
    assert_eq!(body["processedFiles"].as_array().unwrap().len(), 0);
    assert!(body["error"]["message"].as_str().unwrap().contains("metadata"));
    assert_eq!(app.file_count().await, 0);
}

#[tokio::test]
async fn test_malformed_metadata_is_rejected() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part("file[]", text_part("a.txt", "a"))
        .add_text("metadata[]", "{broken");

    let response = app.client().post("/v1/files").multipart(form).await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(app.file_count().await, 0);
}

#[tokio::test]
async fn test_missing_file_part_is_rejected() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_text("bucket-id", "default");
    let response = app.client().post("/v1/files").multipart(form).await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert!(body["error"]["message"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn test_unknown_bucket_is_not_found() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_text("bucket-id", "does-not-exist")
        .add_part("file[]", text_part("a.txt", "a"));
    let response = app.client().post("/v1/files").multipart(form).await;

    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_size_policy_boundaries() {
    let app = setup_test_app().await;
    app.set_bucket_limits(3, 5).await;

    let at_bounds = MultipartForm::new()
        .add_part("file[]", text_part("min.txt", "abc"))
        .add_part("file[]", text_part("max.txt", "abcde"));
    let response = app.client().post("/v1/files").multipart(at_bounds).await;
    assert_eq!(response.status_code(), 201);

    let too_small = MultipartForm::new().add_part("file[]", text_part("small.txt", "ab"));
    let response = app.client().post("/v1/files").multipart(too_small).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"]["data"]["file"], "small.txt");
    assert_eq!(body["error"]["data"]["size"], 2);
    assert_eq!(body["error"]["data"]["minSize"], 3);

    let too_big = MultipartForm::new().add_part("file[]", text_part("big.txt", "abcdef"));
    let response = app.client().post("/v1/files").multipart(too_big).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"]["data"]["maxSize"], 5);
}

#[tokio::test]
async fn test_partial_batch_keeps_earlier_files() {
    let app = setup_test_app().await;
    app.set_bucket_limits(1, 4).await;

    let form = MultipartForm::new()
        .add_part("file[]", text_part("ok.txt", "ok"))
        .add_part("file[]", text_part("too-big.txt", "way too big"))
        .add_part("file[]", text_part("never.txt", "no"));
    let response = app.client().post("/v1/files").multipart(form).await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    let processed = body["processedFiles"].as_array().unwrap();
    assert_eq!(processed.len(), 1);
    assert_eq!(processed[0]["name"], "ok.txt");
    assert_eq!(app.file_count().await, 1);
}

#[tokio::test]
async fn test_png_upload_is_transcoded_to_webp() {
    let app = setup_test_app().await;

    let png = create_test_png(40, 30);
    let form = MultipartForm::new().add_part(
        "file[]",
        Part::bytes(png).file_name("photo.png").mime_type("image/png"),
    );
    let response = app.client().post("/v1/files").multipart(form).await;
    assert_eq!(response.status_code(), 201);

    let body: Value = response.json();
    let file = &body["processedFiles"][0];
    assert_eq!(file["mimeType"], "image/webp");
    assert!(!file["blurhash"].as_str().unwrap().is_empty());

    let id = file["id"].as_str().unwrap();
    let download = app.client().get(&format!("/v1/files/{}", id)).await;
    assert_eq!(download.status_code(), 200);
    let bytes = download.as_bytes();
    assert_eq!(file["size"], bytes.len());
    assert_eq!(
        image::guess_format(bytes).unwrap(),
        image::ImageFormat::WebP
    );
}

#[tokio::test]
async fn test_undeclared_text_is_sniffed() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part(
        "file[]",
        Part::bytes(b"just some words".to_vec()).file_name("notes"),
    );
    let response = app.client().post("/v1/files").multipart(form).await;
    assert_eq!(response.status_code(), 201);

    let body: Value = response.json();
    assert_eq!(body["processedFiles"][0]["mimeType"], "text/plain; charset=utf-8");
}
