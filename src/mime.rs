//! File-extension keyed content-type lookup.
//!
//! Used by the serve conveniences on
//! [`ResponseWriter`](crate::ResponseWriter) to fill the `Content-Type`
//! header from a file-extension-like hint.

/// Maps a file-extension-like hint to a content-type string.
///
/// The hint is matched case-insensitively, with or without a leading dot.
/// Unknown or absent hints fall back to `application/octet-stream`.
///
/// # Examples
/// ```
/// assert_eq!(bare_http::mime::lookup(Some("html")), "text/html");
/// assert_eq!(bare_http::mime::lookup(Some(".PNG")), "image/png");
/// assert_eq!(bare_http::mime::lookup(None), "application/octet-stream");
/// ```
pub fn lookup(hint: Option<&str>) -> &'static str {
    let Some(hint) = hint else {
        return "application/octet-stream";
    };

    match hint.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "xml" => "text/xml",
        "js" => "application/javascript",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
