//! Folder operations with ownership checks and refcount-aware recursive
//! deletion.

use std::collections::BTreeSet;
use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use depot_core::{AuthPrincipal, Content, Error, Folder, Result, UserFileEntry};
use depot_db::{PgContentRepository, PgFolderRepository, PgUserFileRepository};
use depot_store::ObjectStore;

use crate::lifecycle::LifecycleService;

/// Folder tree operations on behalf of an authenticated principal.
pub struct FolderService {
    pool: PgPool,
    folders: PgFolderRepository,
    user_files: PgUserFileRepository,
    contents: PgContentRepository,
    lifecycle: LifecycleService,
}

impl FolderService {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            folders: PgFolderRepository::new(pool.clone()),
            user_files: PgUserFileRepository::new(pool.clone()),
            contents: PgContentRepository::new(pool.clone()),
            lifecycle: LifecycleService::new(pool.clone(), store),
            pool,
        }
    }

    /// Create a folder; name validation and parent ownership live in the
    /// repository.
    pub async fn create(
        &self,
        principal: &AuthPrincipal,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Folder> {
        self.folders.create(principal.id, name, parent_id).await
    }

    /// Rename a folder the caller owns.
    pub async fn rename(
        &self,
        principal: &AuthPrincipal,
        folder_id: Uuid,
        new_name: &str,
    ) -> Result<()> {
        self.require_owned(principal, folder_id).await?;
        self.folders.rename(principal.id, folder_id, new_name).await
    }

    /// The caller's folder forest.
    pub async fn list(&self, principal: &AuthPrincipal) -> Result<Vec<Folder>> {
        self.folders.list(principal.id).await
    }

    /// Active files placed directly in a folder (`None` = root).
    pub async fn list_files(
        &self,
        principal: &AuthPrincipal,
        folder_id: Option<Uuid>,
    ) -> Result<Vec<UserFileEntry>> {
        if let Some(id) = folder_id {
            self.require_owned(principal, id).await?;
        }
        self.user_files.list_in_folder(principal.id, folder_id).await
    }

    /// Move one of the caller's files into a folder (`None` = root).
    pub async fn move_to_folder(
        &self,
        principal: &AuthPrincipal,
        user_file_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<()> {
        if let Some(id) = folder_id {
            self.require_owned(principal, id).await?;
        }
        self.user_files
            .move_to_folder(principal.id, user_file_id, folder_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("file {user_file_id}")))
    }

    /// Non-recursive delete: refuses when subfolders exist, otherwise moves
    /// contained files to the root and drops the folder, in one transaction.
    pub async fn delete(&self, principal: &AuthPrincipal, folder_id: Uuid) -> Result<()> {
        self.require_owned(principal, folder_id).await?;

        let mut tx = self.pool.begin().await?;

        let children = self.folders.child_count_tx(&mut tx, folder_id).await?;
        if children > 0 {
            return Err(Error::NotEmpty(format!(
                "folder {folder_id} has {children} subfolders"
            )));
        }

        let moved = self.user_files.clear_folder_tx(&mut tx, folder_id).await?;
        self.folders.delete_tx(&mut tx, folder_id).await?;
        tx.commit().await?;

        info!(
            subsystem = "folders",
            op = "delete",
            folder_id = %folder_id,
            affected = moved,
            "folder removed, files moved to root"
        );
        Ok(())
    }

    /// Recursive delete: hard-removes every file claim in the subtree and
    /// every folder, reconciling refcounts group-wise, then destroys any
    /// content left without references.
    pub async fn delete_recursive(&self, principal: &AuthPrincipal, folder_id: Uuid) -> Result<()> {
        self.require_owned(principal, folder_id).await?;

        // Depth-bounded descent; an empty folder yields just itself and the
        // delete below is a no-op plus one row.
        let subtree = self.folders.subtree(folder_id).await?;
        let folder_ids: Vec<Uuid> = subtree.iter().map(|f| f.id).collect();

        let mut orphaned: Vec<Content> = Vec::new();
        let mut tx = self.pool.begin().await?;

        // Read the affected claims first and lock their contents in id
        // order, so this serializes cleanly against adopt and purge.
        let pairs = self
            .user_files
            .claims_in_folders_tx(&mut tx, &folder_ids)
            .await?;
        let content_ids: BTreeSet<Uuid> = pairs.iter().map(|(_, c)| *c).collect();
        for content_id in &content_ids {
            self.contents.lock_tx(&mut tx, *content_id).await?;
        }

        self.user_files
            .delete_in_folders_tx(&mut tx, &folder_ids)
            .await?;

        for (principal_id, content_id) in pairs {
            let remaining = self
                .user_files
                .active_count_tx(&mut tx, principal_id, content_id)
                .await?;
            if remaining == 0 {
                let ref_count = self.contents.decrement_ref_tx(&mut tx, content_id).await?;
                if ref_count == 0 {
                    if let Some(content) = self.contents.lock_tx(&mut tx, content_id).await? {
                        orphaned.push(content);
                    }
                }
            }
        }

        self.folders.delete_many_tx(&mut tx, &folder_ids).await?;
        tx.commit().await?;

        info!(
            subsystem = "folders",
            op = "delete_recursive",
            folder_id = %folder_id,
            affected = folder_ids.len() as u64,
            "subtree removed"
        );

        for content in &orphaned {
            self.lifecycle.destroy_if_orphaned(content).await?;
        }
        Ok(())
    }

    async fn require_owned(&self, principal: &AuthPrincipal, folder_id: Uuid) -> Result<Folder> {
        self.folders
            .get_owned(principal.id, folder_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("folder {folder_id}")))
    }
}
