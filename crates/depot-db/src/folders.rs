//! Folder repository: a per-principal forest with bounded descent.
//!
//! Every subtree computation walks level by level instead of recursing, and
//! refuses trees deeper than the configured cap, so a corrupted parent chain
//! can never hang a request.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use depot_core::defaults::MAX_FOLDER_DEPTH;
use depot_core::{Error, Folder, Result};

use crate::conflict_on_unique;

/// PostgreSQL repository for folders.
pub struct PgFolderRepository {
    pool: Pool<Postgres>,
}

impl PgFolderRepository {
    /// Create a new PgFolderRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create a folder under an optional parent.
    ///
    /// The name must be non-empty after trimming and unique among siblings;
    /// the parent, when given, must belong to the same principal.
    pub async fn create(
        &self,
        principal_id: Uuid,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("folder name is empty".to_string()));
        }

        if let Some(parent) = parent_id {
            let owned = self.get_owned(principal_id, parent).await?;
            if owned.is_none() {
                return Err(Error::NotFound(format!("parent folder {parent}")));
            }
        }

        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO folder (id, principal_id, name, parent_id, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(id)
        .bind(principal_id)
        .bind(name)
        .bind(parent_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, &format!("folder name {name} already exists here")))?;

        Ok(Folder {
            id,
            principal_id,
            name: name.to_string(),
            parent_id,
            created_at: now,
        })
    }

    /// Rename a folder, preserving sibling uniqueness.
    pub async fn rename(&self, principal_id: Uuid, folder_id: Uuid, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(Error::InvalidArgument("folder name is empty".to_string()));
        }

        let result = sqlx::query(
            "UPDATE folder SET name = $3 WHERE id = $2 AND principal_id = $1",
        )
        .bind(principal_id)
        .bind(folder_id)
        .bind(new_name)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, &format!("folder name {new_name} already exists here")))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("folder {folder_id}")));
        }
        Ok(())
    }

    /// Fetch a folder by id.
    pub async fn get(&self, folder_id: Uuid) -> Result<Option<Folder>> {
        let row = sqlx::query(
            "SELECT id, principal_id, name, parent_id, created_at FROM folder WHERE id = $1",
        )
        .bind(folder_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| folder_from_row(&r)))
    }

    /// Fetch a folder only if it belongs to the principal.
    pub async fn get_owned(&self, principal_id: Uuid, folder_id: Uuid) -> Result<Option<Folder>> {
        let row = sqlx::query(
            r#"SELECT id, principal_id, name, parent_id, created_at
               FROM folder WHERE id = $1 AND principal_id = $2"#,
        )
        .bind(folder_id)
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| folder_from_row(&r)))
    }

    /// Find a child folder by name under an optional parent (`None` = root).
    pub async fn find_child(
        &self,
        principal_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> Result<Option<Folder>> {
        let row = match parent_id {
            Some(parent) => {
                sqlx::query(
                    r#"SELECT id, principal_id, name, parent_id, created_at
                       FROM folder
                       WHERE principal_id = $1 AND parent_id = $2 AND name = $3"#,
                )
                .bind(principal_id)
                .bind(parent)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"SELECT id, principal_id, name, parent_id, created_at
                       FROM folder
                       WHERE principal_id = $1 AND parent_id IS NULL AND name = $2"#,
                )
                .bind(principal_id)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row.map(|r| folder_from_row(&r)))
    }

    /// All folders of a principal, parents before children where possible.
    pub async fn list(&self, principal_id: Uuid) -> Result<Vec<Folder>> {
        let rows = sqlx::query(
            r#"SELECT id, principal_id, name, parent_id, created_at
               FROM folder WHERE principal_id = $1
               ORDER BY parent_id NULLS FIRST, name"#,
        )
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(folder_from_row).collect())
    }

    /// Direct children of a folder.
    pub async fn children(&self, folder_id: Uuid) -> Result<Vec<Folder>> {
        let rows = sqlx::query(
            r#"SELECT id, principal_id, name, parent_id, created_at
               FROM folder WHERE parent_id = $1
               ORDER BY name"#,
        )
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(folder_from_row).collect())
    }

    /// Number of direct subfolders.
    pub async fn child_count_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        folder_id: Uuid,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folder WHERE parent_id = $1")
            .bind(folder_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(count)
    }

    /// The folder plus every descendant, breadth-first, without principal
    /// filter (sharing contexts traverse other people's trees).
    ///
    /// Rejects trees deeper than the cap with `InvalidArgument`.
    pub async fn subtree(&self, folder_id: Uuid) -> Result<Vec<Folder>> {
        let root = self
            .get(folder_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("folder {folder_id}")))?;

        let mut all = vec![root];
        let mut frontier = vec![folder_id];

        for _depth in 0..=MAX_FOLDER_DEPTH {
            if frontier.is_empty() {
                return Ok(all);
            }
            let rows = sqlx::query(
                r#"SELECT id, principal_id, name, parent_id, created_at
                   FROM folder WHERE parent_id = ANY($1)
                   ORDER BY name"#,
            )
            .bind(&frontier)
            .fetch_all(&self.pool)
            .await?;

            frontier = rows.iter().map(|r| r.get("id")).collect();
            all.extend(rows.iter().map(folder_from_row));
        }

        if frontier.is_empty() {
            Ok(all)
        } else {
            Err(Error::InvalidArgument(format!(
                "folder tree deeper than {MAX_FOLDER_DEPTH} levels"
            )))
        }
    }

    /// Chain of ancestors from the folder's parent up to its root,
    /// depth-capped like `subtree`.
    pub async fn ancestors(&self, folder_id: Uuid) -> Result<Vec<Folder>> {
        let mut chain = Vec::new();
        let mut cursor = self
            .get(folder_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("folder {folder_id}")))?
            .parent_id;

        for _depth in 0..MAX_FOLDER_DEPTH {
            let Some(parent_id) = cursor else {
                return Ok(chain);
            };
            let parent = self.get(parent_id).await?.ok_or_else(|| {
                Error::Internal(format!("folder parent {parent_id} missing"))
            })?;
            cursor = parent.parent_id;
            chain.push(parent);
        }

        if cursor.is_none() {
            Ok(chain)
        } else {
            Err(Error::InvalidArgument(format!(
                "folder tree deeper than {MAX_FOLDER_DEPTH} levels"
            )))
        }
    }

    /// Delete one folder row.
    pub async fn delete_tx(&self, tx: &mut Transaction<'_, Postgres>, folder_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM folder WHERE id = $1")
            .bind(folder_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Delete a set of folder rows (leaves-first ordering is not required;
    /// the parent FK cascades within the set).
    pub async fn delete_many_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        folder_ids: &[Uuid],
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM folder WHERE id = ANY($1)")
            .bind(folder_ids)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}

fn folder_from_row(row: &sqlx::postgres::PgRow) -> Folder {
    Folder {
        id: row.get("id"),
        principal_id: row.get("principal_id"),
        name: row.get("name"),
        parent_id: row.get("parent_id"),
        created_at: row.get("created_at"),
    }
}
