//! Content types by file extension.

use hyp_drive::path;

/// Fallback for unknown or missing extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type for `path`, judged by its extension only.
pub fn content_type(path: &str) -> &'static str {
    let Some(ext) = path::extension(path) else {
        return DEFAULT_CONTENT_TYPE;
    };
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" | "cjs" => "application/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "css" => "text/css; charset=utf-8",
        "txt" | "md" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "wasm" => "application/wasm",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(content_type("/app/index.html"), "text/html; charset=utf-8");
        assert_eq!(content_type("/movie.MP4"), "video/mp4");
        assert_eq!(content_type("/lib/a.js"), "application/javascript; charset=utf-8");
    }

    #[test]
    fn unknown_or_missing() {
        assert_eq!(content_type("/LICENSE"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type("/.env"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type("/data.bin"), DEFAULT_CONTENT_TYPE);
    }
}
