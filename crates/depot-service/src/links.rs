//! Public links: mint, revoke, resolve.
//!
//! Resolution collapses every failure mode the anonymous caller may not
//! distinguish — unknown token, revoked, expired — into `RevokedOrExpired`,
//! except a token that never existed, which is `NotFound`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use depot_core::{
    AuthPrincipal, Content, Error, FileRole, Folder, LinkSubject, PublicLink, Result,
};
use depot_db::{
    PgContentRepository, PgFolderRepository, PgPublicLinkRepository, PgUserFileRepository,
};

/// What a resolved token points at.
#[derive(Debug, Clone)]
pub enum ResolvedSubject {
    File(Content),
    Folder(Folder),
}

/// A live link together with its subject.
#[derive(Debug, Clone)]
pub struct ResolvedLink {
    pub link: PublicLink,
    pub subject: ResolvedSubject,
}

/// Issues and resolves anonymous access tokens.
pub struct PublicLinkService {
    links: PgPublicLinkRepository,
    contents: PgContentRepository,
    folders: PgFolderRepository,
    user_files: PgUserFileRepository,
}

impl PublicLinkService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            links: PgPublicLinkRepository::new(pool.clone()),
            contents: PgContentRepository::new(pool.clone()),
            folders: PgFolderRepository::new(pool.clone()),
            user_files: PgUserFileRepository::new(pool),
        }
    }

    /// Mint a link for a content the caller owns.
    pub async fn create_file_link(
        &self,
        principal: &AuthPrincipal,
        content_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<PublicLink> {
        let claim = self
            .user_files
            .newest_active(principal.id, content_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("content {content_id}")))?;
        if claim.role != FileRole::Owner {
            return Err(Error::Forbidden(
                "only the owner can create a public link".to_string(),
            ));
        }

        self.links
            .create(LinkSubject::File, content_id, principal.id, expires_at)
            .await
    }

    /// Mint a link for a folder the caller owns.
    pub async fn create_folder_link(
        &self,
        principal: &AuthPrincipal,
        folder_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<PublicLink> {
        self.folders
            .get_owned(principal.id, folder_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("folder {folder_id}")))?;

        self.links
            .create(LinkSubject::Folder, folder_id, principal.id, expires_at)
            .await
    }

    /// Revoke the newest active link on a content.
    pub async fn revoke_file_link(
        &self,
        principal: &AuthPrincipal,
        content_id: Uuid,
    ) -> Result<()> {
        self.links
            .revoke_newest(LinkSubject::File, content_id, principal.id)
            .await?
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("no active link for content {content_id}")))
    }

    /// Revoke the newest active link on a folder.
    pub async fn revoke_folder_link(
        &self,
        principal: &AuthPrincipal,
        folder_id: Uuid,
    ) -> Result<()> {
        self.links
            .revoke_newest(LinkSubject::Folder, folder_id, principal.id)
            .await?
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("no active link for folder {folder_id}")))
    }

    /// Anonymous entry point: a token proves possession, no identity needed.
    pub async fn resolve(&self, token: &str) -> Result<ResolvedLink> {
        let link = self
            .links
            .resolve(token)
            .await?
            .ok_or_else(|| Error::NotFound("unknown link".to_string()))?;

        if !link.is_live(Utc::now()) {
            return Err(Error::RevokedOrExpired("link".to_string()));
        }

        let subject = match link.subject_kind {
            LinkSubject::File => {
                let content = self
                    .contents
                    .get(link.subject_id)
                    .await?
                    .ok_or_else(|| Error::NotFound("linked file".to_string()))?;
                ResolvedSubject::File(content)
            }
            LinkSubject::Folder => {
                let folder = self
                    .folders
                    .get(link.subject_id)
                    .await?
                    .ok_or_else(|| Error::NotFound("linked folder".to_string()))?;
                ResolvedSubject::Folder(folder)
            }
        };

        Ok(ResolvedLink { link, subject })
    }

    /// Fire-and-forget traversal/download counter.
    pub async fn record_access(&self, token: &str) {
        if let Err(e) = self.links.increment_access(token).await {
            warn!(
                subsystem = "links",
                op = "record_access",
                error = %e,
                "failed to bump link counter"
            );
        }
    }
}
