//! Claim lifecycle: soft-delete, recover, purge.
//!
//! Refcount mutation always shares the transaction that changes the claim;
//! blob deletion happens strictly after commit, against the re-read
//! committed refcount, so a rollback can never leak a deleted blob and a
//! concurrent adoption wins the destroy race.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use depot_core::{AuthPrincipal, Content, Error, Result};
use depot_db::{PgContentRepository, PgUserFileRepository};
use depot_store::ObjectStore;

/// Soft-delete / recover / purge over a principal's claims.
pub struct LifecycleService {
    pool: PgPool,
    contents: PgContentRepository,
    user_files: PgUserFileRepository,
    store: Arc<dyn ObjectStore>,
}

impl LifecycleService {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            contents: PgContentRepository::new(pool.clone()),
            user_files: PgUserFileRepository::new(pool.clone()),
            pool,
            store,
        }
    }

    /// Trash the principal's newest active claim on the content.
    pub async fn soft_delete(&self, principal: &AuthPrincipal, content_id: Uuid) -> Result<Uuid> {
        self.user_files
            .soft_delete_newest(principal.id, content_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no active file for content {content_id}")))
    }

    /// Trash one specific claim.
    pub async fn soft_delete_by_id(
        &self,
        principal: &AuthPrincipal,
        user_file_id: Uuid,
    ) -> Result<Uuid> {
        self.user_files
            .soft_delete_by_id(principal.id, user_file_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file {user_file_id}")))
    }

    /// Restore the principal's newest trashed claim on the content.
    /// No refcount change: the trash never released the reference.
    pub async fn recover(&self, principal: &AuthPrincipal, content_id: Uuid) -> Result<Uuid> {
        self.user_files
            .recover_newest(principal.id, content_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no trashed file for content {content_id}")))
    }

    /// Restore one specific trashed claim.
    pub async fn recover_by_id(
        &self,
        principal: &AuthPrincipal,
        user_file_id: Uuid,
    ) -> Result<Uuid> {
        self.user_files
            .recover_by_id(principal.id, user_file_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file {user_file_id}")))
    }

    /// Hard-remove the principal's newest claim on the content (either
    /// state), destroying the content and its blob when the last reference
    /// goes away.
    pub async fn purge(&self, principal: &AuthPrincipal, content_id: Uuid) -> Result<()> {
        let content = self.purge_claim(principal.id, content_id, None).await?;
        self.destroy_if_orphaned(&content).await
    }

    /// Hard-remove one specific claim.
    pub async fn purge_by_id(
        &self,
        principal: &AuthPrincipal,
        user_file_id: Uuid,
    ) -> Result<()> {
        let claim = self
            .user_files
            .get(user_file_id)
            .await?
            .filter(|uf| uf.principal_id == principal.id)
            .ok_or_else(|| Error::NotFound(format!("file {user_file_id}")))?;

        let content = self
            .purge_claim(principal.id, claim.content_id, Some(user_file_id))
            .await?;
        self.destroy_if_orphaned(&content).await
    }

    /// The transactional half of a purge: lock the content row, delete the
    /// claim, decrement the refcount when the principal's last active claim
    /// went away.
    async fn purge_claim(
        &self,
        principal_id: Uuid,
        content_id: Uuid,
        user_file_id: Option<Uuid>,
    ) -> Result<Content> {
        let mut tx = self.pool.begin().await?;

        let content = self
            .contents
            .lock_tx(&mut tx, content_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("content {content_id}")))?;

        let removed = match user_file_id {
            Some(id) => self.user_files.delete_by_id_tx(&mut tx, principal_id, id).await?,
            None => {
                self.user_files
                    .delete_newest_tx(&mut tx, principal_id, content_id)
                    .await?
            }
        };
        let removed = removed
            .ok_or_else(|| Error::NotFound(format!("no file for content {content_id}")))?;

        let remaining_active = self
            .user_files
            .active_count_tx(&mut tx, principal_id, content_id)
            .await?;

        let ref_count = if remaining_active == 0 {
            self.contents.decrement_ref_tx(&mut tx, content_id).await?
        } else {
            content.ref_count
        };

        tx.commit().await?;

        info!(
            subsystem = "lifecycle",
            op = "purge",
            principal_id = %principal_id,
            content_id = %content_id,
            user_file_id = %removed.id,
            ref_count,
            "claim purged"
        );

        Ok(content)
    }

    /// Post-commit cleanup: when the committed refcount reads zero, remove
    /// the blob and then the content row.
    ///
    /// The row delete is conditioned on `ref_count = 0`, so an adoption that
    /// raced in after the re-read keeps the row. A blob-removal failure
    /// surfaces and leaves the row for an out-of-band retry.
    pub(crate) async fn destroy_if_orphaned(&self, content: &Content) -> Result<()> {
        match self.contents.ref_count(content.id).await? {
            Some(0) => {
                self.store.remove(&content.blob_locator).await?;
                let destroyed = self.contents.destroy_if_unreferenced(content.id).await?;
                debug!(
                    subsystem = "lifecycle",
                    op = "destroy",
                    content_id = %content.id,
                    destroyed,
                    "orphaned content cleanup"
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
