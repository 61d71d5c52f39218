//! Upload coordination: validation, fingerprinting, dedup routing.
//!
//! Single-file path: bounded read, MIME resolution and safety screening,
//! SHA-256 fingerprint, then either a dedup short-circuit (the principal
//! already owns these bytes) or blob put + transactional adoption. The
//! content row is locked `FOR UPDATE` for the adoption decision, so two
//! concurrent uploads of the same bytes by one principal converge on a
//! single claim and a single refcount increment.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};
use uuid::Uuid;

use depot_core::defaults::MAX_UPLOAD_SIZE_BYTES;
use depot_core::{
    resolve_mime, sanitize_filename, screen_upload, AuthPrincipal, ClaimState, Content,
    DepotConfig, Error, FileRole, FolderUploadEntry, Result, UploadRequest, UserFile,
};
use depot_db::{
    compute_content_hash, PgContentRepository, PgFolderRepository, PgUserFileRepository,
};
use depot_store::{content_locator, ObjectStore};

use crate::links::{PublicLinkService, ResolvedSubject};

/// Result of an upload: the claim, its content, and whether the bytes were
/// already present somewhere in the system.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub user_file: UserFile,
    pub content: Content,
    /// True when no blob write happened (content already stored).
    pub deduplicated: bool,
}

/// Coordinates the upload path across store, content, and claim state.
pub struct UploadCoordinator {
    pool: PgPool,
    contents: PgContentRepository,
    user_files: PgUserFileRepository,
    folders: PgFolderRepository,
    links: PublicLinkService,
    store: Arc<dyn ObjectStore>,
    config: Arc<DepotConfig>,
}

impl UploadCoordinator {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>, config: Arc<DepotConfig>) -> Self {
        Self {
            contents: PgContentRepository::new(pool.clone()),
            user_files: PgUserFileRepository::new(pool.clone()),
            folders: PgFolderRepository::new(pool.clone()),
            links: PublicLinkService::new(pool.clone()),
            pool,
            store,
            config,
        }
    }

    /// Upload from an async byte source, reading at most the maximum upload
    /// size into memory.
    pub async fn upload<R>(
        &self,
        principal: &AuthPrincipal,
        req: UploadRequest,
        mut source: R,
    ) -> Result<UploadOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut data = Vec::new();
        let mut limited = (&mut source).take(MAX_UPLOAD_SIZE_BYTES as u64 + 1);
        limited.read_to_end(&mut data).await?;
        self.upload_bytes(principal, req, &data).await
    }

    /// Upload an already-buffered payload.
    pub async fn upload_bytes(
        &self,
        principal: &AuthPrincipal,
        req: UploadRequest,
        data: &[u8],
    ) -> Result<UploadOutcome> {
        if data.len() > MAX_UPLOAD_SIZE_BYTES {
            return Err(Error::PayloadTooLarge(format!(
                "upload exceeds {MAX_UPLOAD_SIZE_BYTES} bytes"
            )));
        }

        let filename = sanitize_filename(&req.filename);
        screen_upload(&filename, data)?;
        let mime = resolve_mime(&filename, data, req.declared_mime.as_deref())?;

        if let Some(folder_id) = req.folder_id {
            if self.folders.get_owned(principal.id, folder_id).await?.is_none() {
                return Err(Error::NotFound(format!("folder {folder_id}")));
            }
        }

        let hash = compute_content_hash(data);
        let size_bytes = data.len() as i64;

        // Dedup short-circuit: the principal already holds these bytes.
        // No blob write, no quota charge, no refcount change.
        if let Some(existing) = self
            .user_files
            .newest_active_by_hash(principal.id, &hash)
            .await?
        {
            let content = self
                .contents
                .get(existing.content_id)
                .await?
                .ok_or_else(|| Error::Internal("claim without content".to_string()))?;

            if !req.allow_duplicate {
                debug!(
                    subsystem = "upload",
                    op = "dedup_hit",
                    principal_id = %principal.id,
                    content_hash = %hash,
                    "returning existing claim"
                );
                return Ok(UploadOutcome {
                    user_file: existing,
                    content,
                    deduplicated: true,
                });
            }

            let mut tx = self.pool.begin().await?;
            let id = self
                .user_files
                .insert_tx(&mut tx, principal.id, content.id, FileRole::Owner, req.folder_id)
                .await?;
            tx.commit().await?;

            let user_file = self
                .user_files
                .get(id)
                .await?
                .ok_or_else(|| Error::Internal("inserted claim missing".to_string()))?;
            return Ok(UploadOutcome {
                user_file,
                content,
                deduplicated: true,
            });
        }

        let locator = content_locator(&hash);
        let known = self.contents.find_by_hash(&hash).await?;
        let content_is_new = known.is_none();

        if content_is_new {
            // New bytes: the principal cannot hold any claim yet, so the
            // quota gate applies. Check before the blob write to avoid
            // storing bytes that can never be adopted.
            let used = self.user_files.logical_usage(principal.id).await?;
            self.ensure_quota(used, size_bytes)?;
            self.store.put(&locator, data, &mime.0).await?;
        }

        // Adopt inside one transaction with the content row locked.
        let mut tx = self.pool.begin().await?;
        let content = self
            .contents
            .ensure_locked_tx(&mut tx, &hash, &locator, &filename, &mime.0, size_bytes)
            .await?;
        let state = self
            .user_files
            .claim_state_tx(&mut tx, principal.id, content.id)
            .await?;

        if state == ClaimState::None {
            let used = self.user_files.logical_usage_tx(&mut tx, principal.id).await?;
            self.ensure_quota(used, size_bytes)?;
        }

        let (user_file_id, _written) = self
            .user_files
            .adopt_tx(&mut tx, principal.id, content.id, FileRole::Owner, req.folder_id)
            .await?;

        if state == ClaimState::None {
            self.contents.increment_ref_tx(&mut tx, content.id).await?;
        }
        tx.commit().await?;

        info!(
            subsystem = "upload",
            op = "upload",
            principal_id = %principal.id,
            content_id = %content.id,
            content_hash = %hash,
            size_bytes,
            deduplicated = !content_is_new,
            "upload complete"
        );

        let user_file = self
            .user_files
            .get(user_file_id)
            .await?
            .ok_or_else(|| Error::Internal("adopted claim missing".to_string()))?;

        Ok(UploadOutcome {
            user_file,
            content,
            deduplicated: !content_is_new,
        })
    }

    /// Save a publicly linked file into the caller's own space.
    ///
    /// No bytes move: the linked content gets one more claim, carrying the
    /// viewer role — the saver can list and read it, but sharing and link
    /// management stay with the owner. Adoption is quota-checked exactly
    /// like an upload of the same bytes.
    pub async fn save_from_link(
        &self,
        principal: &AuthPrincipal,
        token: &str,
        folder_id: Option<Uuid>,
    ) -> Result<UploadOutcome> {
        let resolved = self.links.resolve(token).await?;
        let ResolvedSubject::File(content) = resolved.subject else {
            return Err(Error::InvalidArgument(
                "only file links can be saved".to_string(),
            ));
        };

        if let Some(folder_id) = folder_id {
            if self.folders.get_owned(principal.id, folder_id).await?.is_none() {
                return Err(Error::NotFound(format!("folder {folder_id}")));
            }
        }

        let mut tx = self.pool.begin().await?;
        let content = self
            .contents
            .lock_tx(&mut tx, content.id)
            .await?
            .ok_or_else(|| Error::NotFound("linked file".to_string()))?;

        let state = self
            .user_files
            .claim_state_tx(&mut tx, principal.id, content.id)
            .await?;

        if state == ClaimState::None {
            let used = self.user_files.logical_usage_tx(&mut tx, principal.id).await?;
            self.ensure_quota(used, content.size_bytes)?;
        }

        let (user_file_id, _written) = self
            .user_files
            .adopt_tx(&mut tx, principal.id, content.id, FileRole::Viewer, folder_id)
            .await?;

        if state == ClaimState::None {
            self.contents.increment_ref_tx(&mut tx, content.id).await?;
        }
        tx.commit().await?;

        self.links.record_access(token).await;

        info!(
            subsystem = "upload",
            op = "save_from_link",
            principal_id = %principal.id,
            content_id = %content.id,
            "linked file saved"
        );

        let user_file = self
            .user_files
            .get(user_file_id)
            .await?
            .ok_or_else(|| Error::Internal("adopted claim missing".to_string()))?;

        Ok(UploadOutcome {
            user_file,
            content,
            deduplicated: true,
        })
    }

    /// Folder upload: the single-file path looped over entries, with
    /// intermediate folders materialized so relative paths survive.
    pub async fn upload_folder(
        &self,
        principal: &AuthPrincipal,
        entries: Vec<FolderUploadEntry>,
        destination: Option<Uuid>,
    ) -> Result<Vec<UploadOutcome>> {
        let mut outcomes = Vec::with_capacity(entries.len());

        for entry in entries {
            let (dirs, filename) = split_relative_path(&entry.relative_path)?;
            let mut parent = destination;
            for dir in dirs {
                parent = Some(self.ensure_folder(principal.id, parent, dir).await?);
            }

            let outcome = self
                .upload_bytes(
                    principal,
                    UploadRequest {
                        filename: filename.to_string(),
                        declared_mime: entry.declared_mime.clone(),
                        folder_id: parent,
                        allow_duplicate: false,
                    },
                    &entry.bytes,
                )
                .await?;
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Find or create one path segment under `parent`.
    async fn ensure_folder(
        &self,
        principal_id: Uuid,
        parent: Option<Uuid>,
        name: &str,
    ) -> Result<Uuid> {
        if let Some(existing) = self.folders.find_child(principal_id, parent, name).await? {
            return Ok(existing.id);
        }
        match self.folders.create(principal_id, name, parent).await {
            Ok(folder) => Ok(folder.id),
            // Concurrent materialization of the same path segment.
            Err(Error::Conflict(_)) => self
                .folders
                .find_child(principal_id, parent, name)
                .await?
                .map(|f| f.id)
                .ok_or_else(|| Error::Internal(format!("folder {name} vanished"))),
            Err(e) => Err(e),
        }
    }

    fn ensure_quota(&self, used: i64, additional: i64) -> Result<()> {
        let quota = self.config.per_user_quota_bytes;
        if used + additional > quota {
            return Err(Error::QuotaExceeded(format!(
                "{additional} bytes over a budget of {quota} ({used} in use)"
            )));
        }
        Ok(())
    }
}

/// Split a forward-slash relative path into directory segments and filename,
/// rejecting traversal and absolute paths.
fn split_relative_path(path: &str) -> Result<(Vec<&str>, &str)> {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let Some((filename, dirs)) = segments.split_last() else {
        return Err(Error::InvalidArgument("empty relative path".to_string()));
    };
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(Error::InvalidArgument(format!(
            "relative path {path} contains traversal segments"
        )));
    }
    Ok((dirs.to_vec(), filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_relative_path_plain_file() {
        let (dirs, file) = split_relative_path("report.pdf").unwrap();
        assert!(dirs.is_empty());
        assert_eq!(file, "report.pdf");
    }

    #[test]
    fn test_split_relative_path_nested() {
        let (dirs, file) = split_relative_path("photos/2026/trip.jpg").unwrap();
        assert_eq!(dirs, vec!["photos", "2026"]);
        assert_eq!(file, "trip.jpg");
    }

    #[test]
    fn test_split_relative_path_ignores_duplicate_slashes() {
        let (dirs, file) = split_relative_path("a//b/c.txt").unwrap();
        assert_eq!(dirs, vec!["a", "b"]);
        assert_eq!(file, "c.txt");
    }

    #[test]
    fn test_split_relative_path_rejects_traversal() {
        assert!(split_relative_path("../secrets.txt").is_err());
        assert!(split_relative_path("a/./b.txt").is_err());
    }

    #[test]
    fn test_split_relative_path_rejects_empty() {
        assert!(split_relative_path("").is_err());
        assert!(split_relative_path("///").is_err());
    }
}
