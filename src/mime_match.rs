//! MIME-range acceptance and filename-to-MIME-type guessing.
//!
//! Content sniffing (inspecting file bytes to determine type) is an
//! out-of-scope pure helper owned by an API client; matching a concrete
//! MIME type against an upload endpoint's accepted ranges is core
//! strategy-selection logic and is implemented here. The `from_file`
//! extension table is a narrow, non-sniffing guess, just enough to support
//! the `Upload::from_file` constructor below.

fn split_mime(mime: &str) -> Option<(&str, &str)> {
    let mime = mime.split(';').next().unwrap_or(mime).trim();
    mime.split_once('/')
}

/// True iff `mime_type` matches at least one entry of `accept`, where each
/// entry is a MIME range such as `*/*`, `image/*`, or `text/plain`.
pub fn acceptable_mime_type(accept: &[String], mime_type: &str) -> bool {
    let Some((ty, subty)) = split_mime(mime_type) else {
        return false;
    };
    accept.iter().any(|pattern| {
        let Some((pty, psubty)) = split_mime(pattern) else {
            return false;
        };
        (pty == "*" || pty.eq_ignore_ascii_case(ty)) && (psubty == "*" || psubty.eq_ignore_ascii_case(subty))
    })
}

/// Best-effort extension-to-MIME guess for `Upload::from_file`. Returns
/// `None` for unrecognized extensions.
pub fn guess_mime_from_extension(path: &std::path::Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "bin" => "application/octet-stream",
        _ => return None,
    };
    Some(mime.to_string())
}
