//! Direct sharing by email.
//!
//! Emails are normalized (trimmed, lowercased) before anything touches the
//! share tables, and a share to the owner's own address is refused.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use depot_core::{
    normalize_email, AuthPrincipal, Error, FileRole, FileShare, FolderShare, Result, ShareRequest,
};
use depot_db::{PgFolderRepository, PgShareRepository, PgUserFileRepository};

/// Creates and removes direct shares on files and folders.
pub struct ShareService {
    shares: PgShareRepository,
    user_files: PgUserFileRepository,
    folders: PgFolderRepository,
}

impl ShareService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            shares: PgShareRepository::new(pool.clone()),
            user_files: PgUserFileRepository::new(pool.clone()),
            folders: PgFolderRepository::new(pool),
        }
    }

    /// Share a content with a set of recipients; idempotent upsert per
    /// email.
    pub async fn share_file(
        &self,
        principal: &AuthPrincipal,
        content_id: Uuid,
        req: ShareRequest,
    ) -> Result<Vec<FileShare>> {
        self.require_file_owner(principal, content_id).await?;
        let emails = self.validated_recipients(principal, &req.emails)?;

        let mut shares = Vec::with_capacity(emails.len());
        for email in &emails {
            shares.push(
                self.shares
                    .upsert_file_share(content_id, principal.id, email, req.expires_at)
                    .await?,
            );
        }
        Ok(shares)
    }

    /// Share a folder (and by inheritance its subtree).
    pub async fn share_folder(
        &self,
        principal: &AuthPrincipal,
        folder_id: Uuid,
        req: ShareRequest,
    ) -> Result<Vec<FolderShare>> {
        self.require_folder_owner(principal, folder_id).await?;
        let emails = self.validated_recipients(principal, &req.emails)?;

        let mut shares = Vec::with_capacity(emails.len());
        for email in &emails {
            shares.push(
                self.shares
                    .upsert_folder_share(folder_id, principal.id, email, req.expires_at)
                    .await?,
            );
        }
        Ok(shares)
    }

    /// Remove a file share; idempotent.
    pub async fn unshare_file(
        &self,
        principal: &AuthPrincipal,
        content_id: Uuid,
        email: &str,
    ) -> Result<()> {
        self.require_file_owner(principal, content_id).await?;
        self.shares
            .delete_file_share(content_id, &normalize_email(email))
            .await
    }

    /// Remove a folder share; idempotent.
    pub async fn unshare_folder(
        &self,
        principal: &AuthPrincipal,
        folder_id: Uuid,
        email: &str,
    ) -> Result<()> {
        self.require_folder_owner(principal, folder_id).await?;
        self.shares
            .delete_folder_share(folder_id, &normalize_email(email))
            .await
    }

    /// Shares on a content, for the owner's sharing panel.
    pub async fn list_file_shares(
        &self,
        principal: &AuthPrincipal,
        content_id: Uuid,
    ) -> Result<Vec<FileShare>> {
        self.require_file_owner(principal, content_id).await?;
        self.shares.list_file_shares(content_id).await
    }

    /// Shares on a folder.
    pub async fn list_folder_shares(
        &self,
        principal: &AuthPrincipal,
        folder_id: Uuid,
    ) -> Result<Vec<FolderShare>> {
        self.require_folder_owner(principal, folder_id).await?;
        self.shares.list_folder_shares(folder_id).await
    }

    /// Check expiry against the strict gate used everywhere: expiring
    /// exactly now counts as expired.
    pub fn share_is_live(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        expires_at.map_or(true, |exp| exp > now)
    }

    async fn require_file_owner(&self, principal: &AuthPrincipal, content_id: Uuid) -> Result<()> {
        let claim = self
            .user_files
            .newest_active(principal.id, content_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("content {content_id}")))?;
        if claim.role != FileRole::Owner {
            return Err(Error::Forbidden("only the owner can manage shares".to_string()));
        }
        Ok(())
    }

    async fn require_folder_owner(&self, principal: &AuthPrincipal, folder_id: Uuid) -> Result<()> {
        self.folders
            .get_owned(principal.id, folder_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("folder {folder_id}")))?;
        Ok(())
    }

    /// Normalize, reject empties and self-shares, drop duplicates.
    fn validated_recipients(
        &self,
        principal: &AuthPrincipal,
        emails: &[String],
    ) -> Result<Vec<String>> {
        let own = normalize_email(&principal.email);
        let mut out: Vec<String> = Vec::with_capacity(emails.len());

        for raw in emails {
            let email = normalize_email(raw);
            if email.is_empty() || !email.contains('@') {
                return Err(Error::InvalidArgument(format!("invalid email: {raw}")));
            }
            if email == own {
                return Err(Error::InvalidArgument(
                    "cannot share an item with its owner".to_string(),
                ));
            }
            if !out.contains(&email) {
                out.push(email);
            }
        }

        if out.is_empty() {
            return Err(Error::InvalidArgument("no recipients given".to_string()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_share_live_without_expiry() {
        let now = Utc::now();
        assert!(ShareService::share_is_live(None, now));
    }

    #[test]
    fn test_share_expiring_exactly_now_is_dead() {
        let now = Utc::now();
        assert!(!ShareService::share_is_live(Some(now), now));
        assert!(ShareService::share_is_live(
            Some(now + Duration::hours(1)),
            now
        ));
    }
}
