//! Content-type resolution for uploaded parts.
//!
//! A declared type is trusted as long as it says something more specific
//! than `application/octet-stream`. Otherwise the leading bytes are sniffed.

use crate::models::upload::FilePart;
use bytes::Bytes;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// How many leading bytes are inspected when sniffing.
const SNIFF_LEN: usize = 3072;

/// Return the part's content together with its resolved content type.
///
/// The returned `Bytes` shares the part's buffer, so callers always see the
/// full content no matter whether sniffing ran.
pub fn resolve(part: &FilePart) -> (Bytes, String) {
    if let Some(declared) = part.content_type.as_deref().map(str::trim) {
        if !declared.is_empty() && !declared.eq_ignore_ascii_case(OCTET_STREAM) {
            return (part.data.clone(), declared.to_string());
        }
    }

    let sniffed = sniff(&part.data);
    tracing::debug!(
        "sniffed content type {} for {} ({} bytes)",
        sniffed,
        part.filename,
        part.data.len()
    );
    (part.data.clone(), sniffed.to_string())
}

/// Detect a content type from the first bytes of `data`.
///
/// Magic numbers are checked first, then the image decoder's own format
/// detection. Anything left that is NUL-free UTF-8 counts as plain text.
pub fn sniff(data: &[u8]) -> &'static str {
    let head = &data[..data.len().min(SNIFF_LEN)];

    if let Some(kind) = infer::get(head) {
        return kind.mime_type();
    }

    if let Ok(format) = image::guess_format(head) {
        return format.to_mime_type();
    }

    if looks_like_text(head) {
        return TEXT_PLAIN;
    }

    OCTET_STREAM
}

fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // a multi-byte sequence cut off by the sniff window is still text
        Err(err) => err.error_len().is_none() && head.len() == SNIFF_LEN,
    }
}

/// The content type without parameters, lowercased.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
