//! Defines the gateway's HTTP routes.
//!
//! ## Structure
//! - `GET  /healthz`        liveness
//! - `GET  /readyz`         readiness (registry + content store)
//! - `POST /v1/files`       upload one or many files (both protocols)
//! - `GET  /v1/files/{id}`  download a finalized file

use crate::{
    handlers::{
        file_handlers::get_file,
        health_handlers::{healthz, readyz},
        upload_handlers::upload_file,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. Upload bodies larger than `max_body_bytes` are rejected
/// before any part is read.
pub fn routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/v1/files",
            post(upload_file).layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .route("/v1/files/{id}", get(get_file))
}
