//! Core data models for the upload gateway.
//!
//! Buckets and file records map to registry rows via `sqlx::FromRow` and
//! serialize as camelCase JSON via `serde`. Request-side types carry the
//! parsed multipart content through the orchestrator.

pub mod bucket;
pub mod context;
pub mod file;
pub mod upload;
