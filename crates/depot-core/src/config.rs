//! Process-wide configuration, loaded once at startup and treated as
//! immutable afterwards.

use crate::defaults;
use crate::error::{Error, Result};

/// Immutable configuration snapshot for the depot core.
///
/// Only the inputs listed here are recognized; everything else (pool sizing,
/// retry policy, presign TTL) comes from [`crate::defaults`].
#[derive(Debug, Clone)]
pub struct DepotConfig {
    /// Endpoint of the S3-compatible object store, e.g. `http://minio:9000`.
    pub object_store_endpoint: String,
    /// Bucket holding the content blobs.
    pub bucket: String,
    /// Optional externally reachable endpoint substituted into presigned
    /// URLs handed to browsers (reverse-proxy deployments).
    pub public_endpoint_override: Option<String>,
    /// Per-principal byte budget.
    pub per_user_quota_bytes: i64,
    /// The one email granted admin; compared normalized.
    pub admin_email: String,
    /// Shared secret for the transport's token layer; opaque to the core.
    pub token_secret: String,
}

impl DepotConfig {
    /// Load configuration from the environment.
    ///
    /// `OBJECT_STORE_ENDPOINT`, `OBJECT_STORE_BUCKET`, `ADMIN_EMAIL` and
    /// `TOKEN_SECRET` are required; `PUBLIC_ENDPOINT_OVERRIDE` and
    /// `PER_USER_QUOTA_BYTES` are optional.
    pub fn from_env() -> Result<Self> {
        let object_store_endpoint = require("OBJECT_STORE_ENDPOINT")?;
        let bucket = require("OBJECT_STORE_BUCKET")?;
        let admin_email = normalize_email(&require("ADMIN_EMAIL")?);
        let token_secret = require("TOKEN_SECRET")?;

        let public_endpoint_override = std::env::var("PUBLIC_ENDPOINT_OVERRIDE")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let per_user_quota_bytes = match std::env::var("PER_USER_QUOTA_BYTES") {
            Ok(raw) => raw.parse::<i64>().map_err(|_| {
                Error::Config(format!("PER_USER_QUOTA_BYTES is not a byte count: {raw}"))
            })?,
            Err(_) => defaults::PER_USER_QUOTA_BYTES,
        };
        if per_user_quota_bytes <= 0 {
            return Err(Error::Config(
                "PER_USER_QUOTA_BYTES must be positive".to_string(),
            ));
        }

        Ok(Self {
            object_store_endpoint,
            bucket,
            public_endpoint_override,
            per_user_quota_bytes,
            admin_email,
            token_secret,
        })
    }

    /// Whether the given email belongs to the configured admin.
    pub fn is_admin(&self, email: &str) -> bool {
        normalize_email(email) == self.admin_email
    }
}

/// Canonical email form used everywhere emails are stored or compared:
/// trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn require(key: &str) -> Result<String> {
    let value = std::env::var(key).map_err(|_| Error::Config(format!("{key} is not set")))?;
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(Error::Config(format!("{key} is empty")));
    }
    Ok(value)
}
