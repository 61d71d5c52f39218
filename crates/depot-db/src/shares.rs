//! Direct-share repository for files and folders.
//!
//! Shares are keyed by `(subject, email)`; re-sharing upserts permission and
//! expiry. Email normalization happens in the service layer — rows here are
//! assumed normalized.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use depot_core::{FileShare, FolderShare, Result, SharePermission};

/// PostgreSQL repository for direct shares.
pub struct PgShareRepository {
    pool: Pool<Postgres>,
}

impl PgShareRepository {
    /// Create a new PgShareRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // FILE SHARES
    // =========================================================================

    /// Create or refresh a file share for one recipient.
    pub async fn upsert_file_share(
        &self,
        content_id: Uuid,
        owner_id: Uuid,
        email: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<FileShare> {
        let row = sqlx::query(
            r#"INSERT INTO file_share
                   (id, content_id, owner_id, shared_with_email, permission, shared_at, expires_at)
               VALUES ($1, $2, $3, $4, 'viewer', $5, $6)
               ON CONFLICT (content_id, shared_with_email)
               DO UPDATE SET permission = EXCLUDED.permission,
                             expires_at = EXCLUDED.expires_at
               RETURNING id, content_id, owner_id, shared_with_email, shared_at, expires_at"#,
        )
        .bind(Uuid::now_v7())
        .bind(content_id)
        .bind(owner_id)
        .bind(email)
        .bind(Utc::now())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(file_share_from_row(&row))
    }

    /// Remove a file share; idempotent.
    pub async fn delete_file_share(&self, content_id: Uuid, email: &str) -> Result<()> {
        sqlx::query("DELETE FROM file_share WHERE content_id = $1 AND shared_with_email = $2")
            .bind(content_id)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The live share granting `email` access to the content, if any.
    ///
    /// Expiry exactly at `now` does not count.
    pub async fn active_file_share(
        &self,
        content_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FileShare>> {
        let row = sqlx::query(
            r#"SELECT id, content_id, owner_id, shared_with_email, shared_at, expires_at
               FROM file_share
               WHERE content_id = $1 AND shared_with_email = $2
                 AND (expires_at IS NULL OR expires_at > $3)"#,
        )
        .bind(content_id)
        .bind(email)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| file_share_from_row(&r)))
    }

    /// All shares on a content, for the owner's sharing panel.
    pub async fn list_file_shares(&self, content_id: Uuid) -> Result<Vec<FileShare>> {
        let rows = sqlx::query(
            r#"SELECT id, content_id, owner_id, shared_with_email, shared_at, expires_at
               FROM file_share WHERE content_id = $1
               ORDER BY shared_at DESC"#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(file_share_from_row).collect())
    }

    // =========================================================================
    // FOLDER SHARES
    // =========================================================================

    /// Create or refresh a folder share for one recipient.
    pub async fn upsert_folder_share(
        &self,
        folder_id: Uuid,
        owner_id: Uuid,
        email: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<FolderShare> {
        let row = sqlx::query(
            r#"INSERT INTO folder_share
                   (id, folder_id, owner_id, shared_with_email, permission, shared_at, expires_at)
               VALUES ($1, $2, $3, $4, 'viewer', $5, $6)
               ON CONFLICT (folder_id, shared_with_email)
               DO UPDATE SET permission = EXCLUDED.permission,
                             expires_at = EXCLUDED.expires_at
               RETURNING id, folder_id, owner_id, shared_with_email, shared_at, expires_at"#,
        )
        .bind(Uuid::now_v7())
        .bind(folder_id)
        .bind(owner_id)
        .bind(email)
        .bind(Utc::now())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(folder_share_from_row(&row))
    }

    /// Remove a folder share; idempotent.
    pub async fn delete_folder_share(&self, folder_id: Uuid, email: &str) -> Result<()> {
        sqlx::query("DELETE FROM folder_share WHERE folder_id = $1 AND shared_with_email = $2")
            .bind(folder_id)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The live share granting `email` access to the folder, if any.
    pub async fn active_folder_share(
        &self,
        folder_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FolderShare>> {
        let row = sqlx::query(
            r#"SELECT id, folder_id, owner_id, shared_with_email, shared_at, expires_at
               FROM folder_share
               WHERE folder_id = $1 AND shared_with_email = $2
                 AND (expires_at IS NULL OR expires_at > $3)"#,
        )
        .bind(folder_id)
        .bind(email)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| folder_share_from_row(&r)))
    }

    /// All shares on a folder.
    pub async fn list_folder_shares(&self, folder_id: Uuid) -> Result<Vec<FolderShare>> {
        let rows = sqlx::query(
            r#"SELECT id, folder_id, owner_id, shared_with_email, shared_at, expires_at
               FROM folder_share WHERE folder_id = $1
               ORDER BY shared_at DESC"#,
        )
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(folder_share_from_row).collect())
    }
}

fn file_share_from_row(row: &sqlx::postgres::PgRow) -> FileShare {
    FileShare {
        id: row.get("id"),
        content_id: row.get("content_id"),
        owner_id: row.get("owner_id"),
        shared_with_email: row.get("shared_with_email"),
        permission: SharePermission::Viewer,
        shared_at: row.get("shared_at"),
        expires_at: row.get("expires_at"),
    }
}

fn folder_share_from_row(row: &sqlx::postgres::PgRow) -> FolderShare {
    FolderShare {
        id: row.get("id"),
        folder_id: row.get("folder_id"),
        owner_id: row.get("owner_id"),
        shared_with_email: row.get("shared_with_email"),
        permission: SharePermission::Viewer,
        shared_at: row.get("shared_at"),
        expires_at: row.get("expires_at"),
    }
}
