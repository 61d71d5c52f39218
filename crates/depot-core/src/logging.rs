//! Structured logging schema and field name constants for depot.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "store", "upload", "lifecycle", "sharing", "activity"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "s3", "adopt", "purge", "permission_resolver"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "upload", "presign", "soft_delete", "resolve_link"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Principal UUID performing the operation.
pub const PRINCIPAL_ID: &str = "principal_id";

/// Content UUID being operated on.
pub const CONTENT_ID: &str = "content_id";

/// User-file (claim) UUID being operated on.
pub const USER_FILE_ID: &str = "user_file_id";

/// Folder UUID being operated on.
pub const FOLDER_ID: &str = "folder_id";

/// Lowercase SHA-256 content hash.
pub const CONTENT_HASH: &str = "content_hash";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte size of the payload or blob.
pub const SIZE_BYTES: &str = "size_bytes";

/// Reference count after the operation.
pub const REF_COUNT: &str = "ref_count";

/// Number of rows or items affected.
pub const AFFECTED: &str = "affected";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";
