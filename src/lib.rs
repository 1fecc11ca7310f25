//! File-storage upload gateway.
//!
//! Accepts multipart uploads, enforces per-bucket size policy, normalizes
//! raster images to webp with a blurhash, and commits each file to a metadata
//! registry and a content store in two phases.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
