//! Contracts between the depot core and its external collaborators.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::AuthPrincipal;

// =============================================================================
// IDENTITY
// =============================================================================

/// Identity provider consumed by the core.
///
/// The transport authenticates the request (JWT, OAuth, session cookie —
/// not this crate's business) and hands the core a resolved principal.
/// Implementations return `Error::Unauthenticated` when the credential is
/// missing or invalid.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve an opaque transport credential to a principal.
    async fn authenticate(&self, credential: &str) -> Result<AuthPrincipal>;
}

// =============================================================================
// SERVICE REQUEST SHAPES
// =============================================================================

/// Parameters for a single-file upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Client-supplied filename; sanitized before storage.
    pub filename: String,
    /// MIME type declared by the client, if any.
    pub declared_mime: Option<String>,
    /// Destination folder; must belong to the uploader.
    pub folder_id: Option<Uuid>,
    /// When true, an already-owned content gets an additional claim instead
    /// of returning the existing one.
    pub allow_duplicate: bool,
}

/// One file of a folder upload, with its relative path inside the selection.
#[derive(Debug, Clone)]
pub struct FolderUploadEntry {
    /// Forward-slash separated path, e.g. `photos/2026/trip.jpg`.
    pub relative_path: String,
    pub declared_mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// Parameters for a direct share of a file or folder.
#[derive(Debug, Clone)]
pub struct ShareRequest {
    /// Recipient emails; normalized before use.
    pub emails: Vec<String>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Request context recorded into the download ledger.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}
