use crate::services::upload_service::UploadService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub uploads: UploadService,

    /// Admin credential placed into every request's `RequestContext`.
    pub admin_secret: Option<String>,
}
