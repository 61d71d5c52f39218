//! Error types for the depot file plane.

use thiserror::Error;

/// Result type alias using depot's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for depot operations.
///
/// Callers see a stable kind; messages may name the affected identifier but
/// never internal schema details.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Caller presented no usable identity
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but not allowed to touch the subject
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Subject or claim absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique-constraint violation (duplicate folder name, email, token)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload would exceed the principal's byte budget
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Upload larger than the maximum accepted size
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Declared MIME type and filename extension disagree incompatibly
    #[error("MIME mismatch: {0}")]
    MimeMismatch(String),

    /// Empty name, malformed id, invalid permission, blocked file type
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Non-recursive delete on a folder that still has subfolders
    #[error("Folder not empty: {0}")]
    NotEmpty(String),

    /// Public link is revoked or past its expiry
    #[error("Link revoked or expired: {0}")]
    RevokedOrExpired(String),

    /// Object store unavailable or returned a non-retryable failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Retryable downstream failure (bounded retry at the store boundary)
    #[error("Transient error: {0}")]
    Transient(String),

    /// Configuration error at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invariant violation; must not leak details
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("file abc".to_string());
        assert_eq!(err.to_string(), "Not found: file abc");
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("folder name taken".to_string());
        assert_eq!(err.to_string(), "Conflict: folder name taken");
    }

    #[test]
    fn test_error_display_quota_exceeded() {
        let err = Error::QuotaExceeded("5 bytes over".to_string());
        assert_eq!(err.to_string(), "Quota exceeded: 5 bytes over");
    }

    #[test]
    fn test_error_display_payload_too_large() {
        let err = Error::PayloadTooLarge("beyond 100 MiB".to_string());
        assert_eq!(err.to_string(), "Payload too large: beyond 100 MiB");
    }

    #[test]
    fn test_error_display_mime_mismatch() {
        let err = Error::MimeMismatch("image/png vs application/pdf".to_string());
        assert!(err.to_string().starts_with("MIME mismatch:"));
    }

    #[test]
    fn test_error_display_not_empty() {
        let err = Error::NotEmpty("folder has children".to_string());
        assert_eq!(err.to_string(), "Folder not empty: folder has children");
    }

    #[test]
    fn test_error_display_revoked_or_expired() {
        let err = Error::RevokedOrExpired("token".to_string());
        assert_eq!(err.to_string(), "Link revoked or expired: token");
    }

    #[test]
    fn test_error_display_forbidden() {
        let err = Error::Forbidden("not the owner".to_string());
        assert_eq!(err.to_string(), "Forbidden: not the owner");
    }

    #[test]
    fn test_error_display_transient() {
        let err = Error::Transient("connection reset".to_string());
        assert_eq!(err.to_string(), "Transient error: connection reset");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_result_type_ok() {
        fn get_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(get_result().unwrap(), 42);
    }
}
