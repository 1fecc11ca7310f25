//! Per-request context threaded into every registry call.

use axum::http::{HeaderMap, HeaderValue};

/// Header carrying the admin credential when the context is rendered for an
/// upstream registry.
pub const ADMIN_SECRET_HEADER: &str = "x-hasura-admin-secret";

/// Header naming the end user on whose behalf the upload happens.
pub const USER_ID_HEADER: &str = "x-hasura-user-id";

/// Built once per inbound request from the gateway's configured admin secret
/// and the caller's headers.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub admin_secret: Option<String>,
    pub headers: HeaderMap,
}

impl RequestContext {
    pub fn new(admin_secret: Option<String>, headers: HeaderMap) -> Self {
        Self {
            admin_secret,
            headers,
        }
    }

    /// User id forwarded by the caller, ignoring empty or non-UTF-8 values.
    pub fn user_id(&self) -> Option<String> {
        self.headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Headers an upstream registry would receive: the caller's headers plus
    /// the admin credential.
    pub fn registry_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(secret) = self.admin_secret.as_deref() {
            if let Ok(value) = HeaderValue::from_str(secret) {
                headers.insert(ADMIN_SECRET_HEADER, value);
            }
        }
        headers
    }
}
