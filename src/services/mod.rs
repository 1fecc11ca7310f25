pub mod content_store;
pub mod content_type;
pub mod image_transcoder;
pub mod registry;
pub mod upload_service;
