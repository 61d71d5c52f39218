//! Download presigning for owners, share recipients, and anonymous link
//! holders, with ledger recording.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use depot_core::defaults::PRESIGN_TTL_SECS;
use depot_core::{
    AccessRole, ActivityKind, AuthPrincipal, Content, DownloadSource, Error, RequestContext,
    Result,
};
use depot_db::{PgActivityRepository, PgContentRepository, PgFolderRepository, PgUserFileRepository};
use depot_store::{Disposition, ObjectStore};

use crate::links::{PublicLinkService, ResolvedSubject};
use crate::permissions::{PermissionResolver, Subject};

/// Hands out presigned URLs and appends download/activity ledger entries.
pub struct DownloadService {
    contents: PgContentRepository,
    user_files: PgUserFileRepository,
    folders: PgFolderRepository,
    activity: PgActivityRepository,
    permissions: PermissionResolver,
    links: PublicLinkService,
    store: Arc<dyn ObjectStore>,
}

impl DownloadService {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            contents: PgContentRepository::new(pool.clone()),
            user_files: PgUserFileRepository::new(pool.clone()),
            folders: PgFolderRepository::new(pool.clone()),
            activity: PgActivityRepository::new(pool.clone()),
            permissions: PermissionResolver::new(pool.clone()),
            links: PublicLinkService::new(pool),
            store,
        }
    }

    /// Presign a download (or inline preview) for an authenticated caller.
    ///
    /// Access resolves through ownership, direct shares, and inherited
    /// folder shares; a share-grounded fetch also lands in the download
    /// ledger.
    pub async fn presign(
        &self,
        principal: &AuthPrincipal,
        content_id: Uuid,
        inline: bool,
        ctx: &RequestContext,
    ) -> Result<String> {
        let role = self
            .permissions
            .require_access(principal.id, &principal.email, Subject::File(content_id))
            .await?;

        let content = self
            .contents
            .get(content_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("content {content_id}")))?;

        let url = self.presign_content(&content, inline).await?;

        let kind = if inline {
            ActivityKind::Preview
        } else {
            ActivityKind::Download
        };
        if let Err(e) = self
            .activity
            .record_activity(principal.id, content_id, kind)
            .await
        {
            warn!(
                subsystem = "activity",
                op = "record_activity",
                error = %e,
                "ledger append failed"
            );
        }

        if role == AccessRole::Viewer {
            if let Some(owner) = self.owner_of(content_id).await? {
                if let Err(e) = self
                    .activity
                    .record_download(
                        content_id,
                        owner,
                        Some(principal.id),
                        DownloadSource::Shared,
                        None,
                        ctx,
                    )
                    .await
                {
                    warn!(
                        subsystem = "activity",
                        op = "record_download",
                        error = %e,
                        "ledger append failed"
                    );
                }
            }
        }

        Ok(url)
    }

    /// Presign a download for an anonymous link holder.
    ///
    /// A file link downloads its subject directly. A folder link downloads
    /// any content the link owner placed (via an active claim) in the linked
    /// folder's subtree — `content_id` picks which one.
    pub async fn presign_public(
        &self,
        token: &str,
        content_id: Option<Uuid>,
        inline: bool,
        ctx: &RequestContext,
    ) -> Result<String> {
        let resolved = self.links.resolve(token).await?;

        let content = match (&resolved.subject, content_id) {
            (ResolvedSubject::File(content), None) => content.clone(),
            (ResolvedSubject::File(content), Some(requested)) if requested == content.id => {
                content.clone()
            }
            (ResolvedSubject::File(_), Some(_)) => {
                return Err(Error::Forbidden("link does not cover this file".to_string()))
            }
            (ResolvedSubject::Folder(folder), Some(requested)) => {
                if !self
                    .content_in_folder_subtree(resolved.link.owner_id, requested, folder.id)
                    .await?
                {
                    return Err(Error::Forbidden("link does not cover this file".to_string()));
                }
                self.contents
                    .get(requested)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("content {requested}")))?
            }
            (ResolvedSubject::Folder(_), None) => {
                return Err(Error::InvalidArgument(
                    "folder links need a file to download".to_string(),
                ))
            }
        };

        let url = self.presign_content(&content, inline).await?;

        self.links.record_access(token).await;
        if let Err(e) = self
            .activity
            .record_download(
                content.id,
                resolved.link.owner_id,
                None,
                DownloadSource::Public,
                Some(token),
                ctx,
            )
            .await
        {
            warn!(
                subsystem = "activity",
                op = "record_download",
                error = %e,
                "ledger append failed"
            );
        }

        Ok(url)
    }

    async fn presign_content(&self, content: &Content, inline: bool) -> Result<String> {
        let disposition = if inline {
            Disposition::Inline
        } else {
            Disposition::Attachment
        };
        self.store
            .presign_get(
                &content.blob_locator,
                disposition,
                &content.original_name,
                Duration::from_secs(PRESIGN_TTL_SECS),
            )
            .await
    }

    /// The principal owed the download-ledger `owner` slot: holder of an
    /// active owner-role claim.
    async fn owner_of(&self, content_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self
            .user_files
            .owners_of(content_id)
            .await?
            .into_iter()
            .next())
    }

    /// Whether the link owner has an active claim on `content_id` placed in
    /// `folder_id` or any of its descendants.
    async fn content_in_folder_subtree(
        &self,
        owner_id: Uuid,
        content_id: Uuid,
        folder_id: Uuid,
    ) -> Result<bool> {
        let subtree: HashSet<Uuid> = self
            .folders
            .subtree(folder_id)
            .await?
            .into_iter()
            .map(|f| f.id)
            .collect();

        let claim = self.user_files.newest_active(owner_id, content_id).await?;
        Ok(claim
            .and_then(|uf| uf.folder_id)
            .map_or(false, |fid| subtree.contains(&fid)))
    }
}
