//! Core data models for the depot file plane.
//!
//! These types are shared across all depot crates and represent the
//! persisted domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// PRINCIPALS
// =============================================================================

/// How a principal authenticates. The core treats both kinds as a single
/// principal set keyed by id; email lookups match across both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    /// Password account managed by this service.
    Local,
    /// Account asserted by an external identity provider.
    Federated,
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrincipalKind::Local => write!(f, "local"),
            PrincipalKind::Federated => write!(f, "federated"),
        }
    }
}

/// A user of the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    /// Stored normalized: trimmed and lowercased.
    pub email: String,
    pub display_name: Option<String>,
    pub kind: PrincipalKind,
    pub created_at: DateTime<Utc>,
}

/// The identity a transport hands to the core after authentication.
///
/// `is_admin` is derived from the configured admin email, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPrincipal {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

// =============================================================================
// CONTENT & USER FILES
// =============================================================================

/// A unique byte sequence, addressed by its SHA-256 hash.
///
/// `ref_count` tracks the number of principals holding a live claim; the row
/// and its blob are destroyed when a purge drives it to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: Uuid,
    /// Lowercase SHA-256 hex over the full byte sequence.
    pub hash: String,
    /// Object-store key, `files/{hash}`.
    pub blob_locator: String,
    /// Filename supplied by the first uploader.
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub ref_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Role a principal holds on a content through a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Owner,
    Viewer,
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileRole::Owner => write!(f, "owner"),
            FileRole::Viewer => write!(f, "viewer"),
        }
    }
}

/// A principal's claim on a Content: the unit of per-user state
/// (role, folder placement, lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFile {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub content_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub role: FileRole,
    pub uploaded_at: DateTime<Utc>,
    /// Set while the claim sits in the trash; NULL when active.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserFile {
    /// Whether the claim is in the active (non-trashed) set.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// A principal's standing toward one content, sampled inside the adopt
/// transaction to drive the refcount decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    /// No claim at all, active or trashed.
    None,
    /// At least one active claim.
    Active,
    /// Only trashed claims.
    Deleted,
}

/// A claim joined with its content metadata, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFileEntry {
    pub id: Uuid,
    pub content_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub role: FileRole,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// FOLDERS
// =============================================================================

/// A node in a principal's folder forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// SHARING
// =============================================================================

/// Permission granted by a direct share. Only `viewer` exists today; the
/// enum keeps the wire shape stable if richer grants ever land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharePermission {
    Viewer,
}

impl std::fmt::Display for SharePermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SharePermission::Viewer => write!(f, "viewer"),
        }
    }
}

/// Direct invitation to a content, keyed by `(subject, email)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileShare {
    pub id: Uuid,
    pub content_id: Uuid,
    pub owner_id: Uuid,
    pub shared_with_email: String,
    pub permission: SharePermission,
    pub shared_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Direct invitation to a folder (and, by inheritance, its subtree).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderShare {
    pub id: Uuid,
    pub folder_id: Uuid,
    pub owner_id: Uuid,
    pub shared_with_email: String,
    pub permission: SharePermission,
    pub shared_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The role the permission resolver answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    Owner,
    Viewer,
}

// =============================================================================
// PUBLIC LINKS
// =============================================================================

/// What a public link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkSubject {
    File,
    Folder,
}

impl std::fmt::Display for LinkSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkSubject::File => write!(f, "file"),
            LinkSubject::Folder => write!(f, "folder"),
        }
    }
}

/// Anonymous tokened access to one content or folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicLink {
    pub id: Uuid,
    pub subject_kind: LinkSubject,
    pub subject_id: Uuid,
    pub owner_id: Uuid,
    /// Opaque, URL-safe, 128 bits of entropy.
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    /// Downloads or traversals; approximate by design.
    pub access_count: i64,
}

impl PublicLink {
    /// Whether the link still grants access at `now`.
    ///
    /// Expiry exactly at `now` counts as expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.map_or(true, |exp| exp > now)
    }
}

// =============================================================================
// LEDGERS
// =============================================================================

/// What the principal did with the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Preview,
    Download,
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityKind::Preview => write!(f, "preview"),
            ActivityKind::Download => write!(f, "download"),
        }
    }
}

/// Append-only record of a principal touching a content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub content_id: Uuid,
    pub kind: ActivityKind,
    pub occurred_at: DateTime<Utc>,
}

/// Which grant a download came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadSource {
    Shared,
    Public,
}

impl std::fmt::Display for DownloadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadSource::Shared => write!(f, "shared"),
            DownloadSource::Public => write!(f, "public"),
        }
    }
}

/// Append-only record of a shared or public download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadEvent {
    pub id: Uuid,
    pub content_id: Uuid,
    pub owner_id: Uuid,
    /// Absent for anonymous public-link downloads.
    pub downloader_id: Option<Uuid>,
    pub source: DownloadSource,
    pub share_token: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// One row of the recent-activity aggregation: the newest event per content
/// with the number of touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentActivity {
    pub content_id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub event_count: i64,
    pub last_at: DateTime<Utc>,
}

// =============================================================================
// STARRED ITEMS
// =============================================================================

/// What a star points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StarKind {
    File,
    Folder,
}

impl std::fmt::Display for StarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StarKind::File => write!(f, "file"),
            StarKind::Folder => write!(f, "folder"),
        }
    }
}

/// A principal's pin on a file or folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarredItem {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub kind: StarKind,
    pub target_id: Uuid,
    pub starred_at: DateTime<Utc>,
}

// =============================================================================
// USAGE REPORT
// =============================================================================

/// Per-principal storage accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageUsage {
    /// Logical bytes: Σ size over distinct contents with an active claim.
    pub used_bytes: i64,
    pub quota_bytes: i64,
    pub percent_used: f64,
    /// Logical minus attributed, floored at zero.
    pub savings_bytes: i64,
    pub savings_percent: f64,
}
