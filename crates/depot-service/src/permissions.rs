//! Permission resolution: owner, direct share, inherited folder share.
//!
//! First match wins. Anonymous callers never reach this resolver — they go
//! through the public-link entry point, which proves possession of a token
//! instead.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use depot_core::{normalize_email, AccessRole, Error, FileRole, Result};
use depot_db::{PgFolderRepository, PgShareRepository, PgUserFileRepository};

/// What a permission question is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// A content, addressed by content id.
    File(Uuid),
    /// A folder.
    Folder(Uuid),
}

/// Answers `(principal, email, subject) → access?`.
pub struct PermissionResolver {
    user_files: PgUserFileRepository,
    folders: PgFolderRepository,
    shares: PgShareRepository,
}

impl PermissionResolver {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_files: PgUserFileRepository::new(pool.clone()),
            folders: PgFolderRepository::new(pool.clone()),
            shares: PgShareRepository::new(pool),
        }
    }

    /// Resolve the caller's effective role on a subject, or `None`.
    pub async fn resolve(
        &self,
        principal_id: Uuid,
        email: &str,
        subject: Subject,
    ) -> Result<Option<AccessRole>> {
        let email = normalize_email(email);
        let now = Utc::now();

        match subject {
            Subject::File(content_id) => {
                // 1. A claim of their own. Owner role wins outright; a
                //    viewer-role claim (saved from a public link via
                //    `UploadCoordinator::save_from_link`) reads but never
                //    owns.
                let own_claim = self.user_files.newest_active(principal_id, content_id).await?;
                if let Some(claim) = &own_claim {
                    if claim.role == FileRole::Owner {
                        return Ok(Some(AccessRole::Owner));
                    }
                }

                // 2. Direct share on the file.
                if self
                    .shares
                    .active_file_share(content_id, &email, now)
                    .await?
                    .is_some()
                {
                    return Ok(Some(AccessRole::Viewer));
                }

                if own_claim.is_some() {
                    return Ok(Some(AccessRole::Viewer));
                }

                // 3. Inherited: the file sits in a shared folder (or a
                //    descendant of one) through someone's active claim.
                for folder_id in self.user_files.folders_containing(content_id).await? {
                    if self.chain_has_share(folder_id, &email).await? {
                        return Ok(Some(AccessRole::Viewer));
                    }
                }

                Ok(None)
            }
            Subject::Folder(folder_id) => {
                let folder = self
                    .folders
                    .get(folder_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("folder {folder_id}")))?;

                if folder.principal_id == principal_id {
                    return Ok(Some(AccessRole::Owner));
                }

                if self.chain_has_share(folder_id, &email).await? {
                    return Ok(Some(AccessRole::Viewer));
                }

                Ok(None)
            }
        }
    }

    /// Convenience guard: resolve or fail with `Forbidden`.
    pub async fn require_access(
        &self,
        principal_id: Uuid,
        email: &str,
        subject: Subject,
    ) -> Result<AccessRole> {
        self.resolve(principal_id, email, subject)
            .await?
            .ok_or_else(|| Error::Forbidden("no access to this item".to_string()))
    }

    /// Walk the folder and its ancestors (depth-capped in the repository)
    /// looking for a live share to `email`.
    async fn chain_has_share(&self, folder_id: Uuid, email: &str) -> Result<bool> {
        let now = Utc::now();

        if self
            .shares
            .active_folder_share(folder_id, email, now)
            .await?
            .is_some()
        {
            return Ok(true);
        }

        for ancestor in self.folders.ancestors(folder_id).await? {
            if self
                .shares
                .active_folder_share(ancestor.id, email, now)
                .await?
                .is_some()
            {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
