//! # depot-store
//!
//! Object-store plane for depot. Translates content records to and from
//! immutable blobs behind an S3-compatible endpoint.
//!
//! The store knows nothing about principals: it speaks locators, bytes, and
//! presigned URLs. [`S3ObjectStore`] is the production backend (MinIO in
//! development); [`MemoryObjectStore`] backs tests.

pub mod memory;
pub mod retry;
pub mod s3;

use std::time::Duration;

use async_trait::async_trait;

use depot_core::defaults::BLOB_KEY_PREFIX;
use depot_core::Result;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// How the browser should treat a presigned download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Render in place (previews).
    Inline,
    /// Save-as download.
    Attachment,
}

impl Disposition {
    fn as_str(&self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// Blob storage abstraction over an object store.
///
/// `put` is idempotent by locator: the key is derived from the content hash,
/// so overwriting means writing identical bytes. `remove` must only be
/// called once the caller has proven no references remain.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write a blob. Idempotent for a given locator.
    async fn put(&self, locator: &str, bytes: &[u8], mime: &str) -> Result<()>;

    /// Issue a time-limited GET URL with disposition and filename signed in.
    async fn presign_get(
        &self,
        locator: &str,
        disposition: Disposition,
        filename: &str,
        ttl: Duration,
    ) -> Result<String>;

    /// Delete a blob. Best-effort; absence is not an error.
    async fn remove(&self, locator: &str) -> Result<()>;

    /// Whether a blob exists at the locator.
    async fn exists(&self, locator: &str) -> Result<bool>;
}

/// Object-store key for a content hash: `files/{sha256hex}`.
pub fn content_locator(hash: &str) -> String {
    format!("{BLOB_KEY_PREFIX}{hash}")
}

/// `Content-Disposition` value signed into presigned URLs.
///
/// The filename is reduced to a quoting-safe ASCII form; anything beyond
/// that is the transport's presentation problem.
pub fn content_disposition(disposition: Disposition, filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();
    let safe = if safe.is_empty() { "file" } else { safe.trim() };
    format!("{}; filename=\"{}\"", disposition.as_str(), safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_locator_prefixes_hash() {
        let hash = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert_eq!(content_locator(hash), format!("files/{hash}"));
    }

    #[test]
    fn test_content_disposition_inline() {
        assert_eq!(
            content_disposition(Disposition::Inline, "report.pdf"),
            "inline; filename=\"report.pdf\""
        );
    }

    #[test]
    fn test_content_disposition_strips_quotes_and_controls() {
        assert_eq!(
            content_disposition(Disposition::Attachment, "we\"ird\n.txt"),
            "attachment; filename=\"weird.txt\""
        );
    }

    #[test]
    fn test_content_disposition_empty_filename_fallback() {
        assert_eq!(
            content_disposition(Disposition::Attachment, "\"\""),
            "attachment; filename=\"file\""
        );
    }
}
