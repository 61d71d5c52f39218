//! MIME resolution and upload safety screening.
//!
//! Resolution order for an upload: the declared type wins, then the
//! extension table, then magic-byte sniffing of the leading bytes. A
//! declared `application/octet-stream` counts as undeclared — it is the
//! generic default of every HTTP client and carries no intent.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::defaults::MIME_SNIFF_BYTES;
use crate::error::{Error, Result};

/// Generic MIME type used when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extensions never accepted for upload (case-insensitive).
static BLOCKED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Windows executables
        "exe", "dll", "scr", "pif", "com", "msi", // Unix executables
        "so", "dylib", "out", // Scripts
        "bat", "cmd", "ps1", "vbs", "wsf", "hta", // JVM
        "jar", "class",
    ]
    .into_iter()
    .collect()
});

/// Magic byte signatures for executable formats.
const EXECUTABLE_MAGIC: &[(&str, &[u8])] = &[
    ("Windows PE", &[0x4D, 0x5A]),
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),
    ("Mach-O", &[0xFE, 0xED, 0xFA, 0xCE]),
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]),
];

/// The MIME type chosen for a stored content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMime(pub String);

/// Resolve the MIME type for an upload and enforce declared/extension
/// compatibility.
///
/// Returns `Error::MimeMismatch` when the declared type and the extension
/// mapping disagree and neither side is a `text/*` relative.
pub fn resolve_mime(filename: &str, data: &[u8], declared: Option<&str>) -> Result<ResolvedMime> {
    let declared = declared
        .map(str::trim)
        .filter(|d| !d.is_empty() && *d != OCTET_STREAM);
    let from_ext = extension(filename).and_then(mime_from_extension);

    if let (Some(decl), Some(ext)) = (declared, from_ext) {
        if decl != ext && !decl.starts_with("text/") && !ext.starts_with("text/") {
            return Err(Error::MimeMismatch(format!(
                "declared {decl} but filename suggests {ext}"
            )));
        }
    }

    if let Some(decl) = declared {
        return Ok(ResolvedMime(decl.to_string()));
    }
    if let Some(ext) = from_ext {
        return Ok(ResolvedMime(ext.to_string()));
    }

    let head = &data[..data.len().min(MIME_SNIFF_BYTES)];
    if let Some(kind) = infer::get(head) {
        return Ok(ResolvedMime(kind.mime_type().to_string()));
    }

    Ok(ResolvedMime(OCTET_STREAM.to_string()))
}

/// Screen an upload for executable content.
///
/// Extension blocklist first, then magic bytes. Shebang scripts are caught
/// by content since they carry no reliable extension.
pub fn screen_upload(filename: &str, data: &[u8]) -> Result<()> {
    if let Some(ext) = extension(filename) {
        if BLOCKED_EXTENSIONS.contains(ext.to_lowercase().as_str()) {
            return Err(Error::InvalidArgument(format!(
                "file extension .{ext} is not allowed"
            )));
        }
    }

    for (name, magic) in EXECUTABLE_MAGIC {
        if data.len() >= magic.len() && &data[..magic.len()] == *magic {
            return Err(Error::InvalidArgument(format!(
                "executable content detected: {name}"
            )));
        }
    }

    if data.starts_with(b"#!/") || data.starts_with(b"#! /") {
        return Err(Error::InvalidArgument(
            "executable scripts are not allowed".to_string(),
        ));
    }

    Ok(())
}

/// Sanitize a client-supplied filename for storage: strip path components,
/// replace control and reserved characters, bound the length.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return "unnamed_file".to_string();
    }

    if sanitized.len() > 255 {
        if let Some(dot_pos) = sanitized.rfind('.') {
            let ext = &sanitized[dot_pos..];
            if ext.len() < 255 {
                let name = &sanitized[..255 - ext.len()];
                return format!("{name}{ext}");
            }
        }
        return sanitized[..255].to_string();
    }

    sanitized.to_string()
}

fn extension(filename: &str) -> Option<&str> {
    let ext = filename.rsplit('.').next()?;
    if ext == filename || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Map common extensions to MIME types. Text formats carry no magic bytes,
/// so the table is the only signal for them.
fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        // Text
        "txt" | "log" => Some("text/plain"),
        "csv" => Some("text/csv"),
        "md" | "markdown" => Some("text/markdown"),
        "html" | "htm" => Some("text/html"),
        "css" => Some("text/css"),
        "xml" => Some("application/xml"),
        "json" => Some("application/json"),
        "yaml" | "yml" => Some("application/yaml"),
        // Documents
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "docx" => {
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        }
        "xls" => Some("application/vnd.ms-excel"),
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        "ppt" => Some("application/vnd.ms-powerpoint"),
        "pptx" => {
            Some("application/vnd.openxmlformats-officedocument.presentationml.presentation")
        }
        // Images
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "heic" => Some("image/heic"),
        // Audio / video
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        "ogg" => Some("audio/ogg"),
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "mov" => Some("video/quicktime"),
        // Archives
        "zip" => Some("application/zip"),
        "tar" => Some("application/x-tar"),
        "gz" => Some("application/gzip"),
        "7z" => Some("application/x-7z-compressed"),
        _ => None,
    }
}
