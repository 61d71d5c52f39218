//! User-file repository: per-principal claims on contents, and the
//! dedup/refcount engine built on them.
//!
//! The adopt operation and every hard delete run inside a caller-owned
//! transaction with the content row already locked `FOR UPDATE`
//! (see `PgContentRepository`), so the claim-state sample that drives the
//! refcount decision cannot race a concurrent adopt or purge.
//!
//! "Newest" always means `ORDER BY uploaded_at DESC, id DESC` — a deliberate
//! convention relied on by soft-delete, recover, and purge.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use depot_core::{ClaimState, FileRole, Result, UserFile, UserFileEntry};

/// PostgreSQL repository for user files (claims).
pub struct PgUserFileRepository {
    pool: Pool<Postgres>,
}

impl PgUserFileRepository {
    /// Create a new PgUserFileRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // ADOPTION (dedup engine)
    // =========================================================================

    /// Sample the principal's standing toward a content.
    ///
    /// Must run inside the transaction that will act on the answer.
    pub async fn claim_state_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        principal_id: Uuid,
        content_id: Uuid,
    ) -> Result<ClaimState> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) FILTER (WHERE deleted_at IS NULL) AS active,
                      COUNT(*) AS total
               FROM user_file
               WHERE principal_id = $1 AND content_id = $2"#,
        )
        .bind(principal_id)
        .bind(content_id)
        .fetch_one(&mut **tx)
        .await?;

        let active: i64 = row.get("active");
        let total: i64 = row.get("total");
        Ok(if active > 0 {
            ClaimState::Active
        } else if total > 0 {
            ClaimState::Deleted
        } else {
            ClaimState::None
        })
    }

    /// Ensure the principal holds an active claim on the content.
    ///
    /// Restores the newest trashed claim when one exists (refreshing
    /// `uploaded_at`, role, and folder), otherwise returns the newest active
    /// claim untouched, otherwise inserts a fresh one. The bool reports
    /// whether a row was written (restore or insert).
    pub async fn adopt_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        principal_id: Uuid,
        content_id: Uuid,
        role: FileRole,
        folder_id: Option<Uuid>,
    ) -> Result<(Uuid, bool)> {
        let now = Utc::now();

        let restored: Option<Uuid> = sqlx::query_scalar(
            r#"UPDATE user_file
               SET deleted_at = NULL, uploaded_at = $3, role = $4, folder_id = $5
               WHERE id = (
                   SELECT id FROM user_file
                   WHERE principal_id = $1 AND content_id = $2 AND deleted_at IS NOT NULL
                   ORDER BY uploaded_at DESC, id DESC
                   LIMIT 1)
               RETURNING id"#,
        )
        .bind(principal_id)
        .bind(content_id)
        .bind(now)
        .bind(role.to_string())
        .bind(folder_id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(id) = restored {
            return Ok((id, true));
        }

        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"SELECT id FROM user_file
               WHERE principal_id = $1 AND content_id = $2 AND deleted_at IS NULL
               ORDER BY uploaded_at DESC, id DESC
               LIMIT 1"#,
        )
        .bind(principal_id)
        .bind(content_id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(id) = existing {
            return Ok((id, false));
        }

        let id = self
            .insert_tx(tx, principal_id, content_id, role, folder_id)
            .await?;
        Ok((id, true))
    }

    /// Unconditionally insert a new claim — an explicit duplicate copy.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        principal_id: Uuid,
        content_id: Uuid,
        role: FileRole,
        folder_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"INSERT INTO user_file (id, principal_id, content_id, folder_id, role, uploaded_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(id)
        .bind(principal_id)
        .bind(content_id)
        .bind(folder_id)
        .bind(role.to_string())
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Number of active claims the principal holds on the content.
    pub async fn active_count_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        principal_id: Uuid,
        content_id: Uuid,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM user_file
               WHERE principal_id = $1 AND content_id = $2 AND deleted_at IS NULL"#,
        )
        .bind(principal_id)
        .bind(content_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Trash the newest active claim for `(principal, content)`.
    pub async fn soft_delete_newest(
        &self,
        principal_id: Uuid,
        content_id: Uuid,
    ) -> Result<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"UPDATE user_file SET deleted_at = $3
               WHERE id = (
                   SELECT id FROM user_file
                   WHERE principal_id = $1 AND content_id = $2 AND deleted_at IS NULL
                   ORDER BY uploaded_at DESC, id DESC
                   LIMIT 1)
               RETURNING id"#,
        )
        .bind(principal_id)
        .bind(content_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Trash one specific active claim owned by the principal.
    pub async fn soft_delete_by_id(
        &self,
        principal_id: Uuid,
        user_file_id: Uuid,
    ) -> Result<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"UPDATE user_file SET deleted_at = $3
               WHERE id = $2 AND principal_id = $1 AND deleted_at IS NULL
               RETURNING id"#,
        )
        .bind(principal_id)
        .bind(user_file_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Restore the newest trashed claim for `(principal, content)`.
    ///
    /// `uploaded_at` is refreshed so later "newest" selections reflect the
    /// restore.
    pub async fn recover_newest(
        &self,
        principal_id: Uuid,
        content_id: Uuid,
    ) -> Result<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"UPDATE user_file SET deleted_at = NULL, uploaded_at = $3
               WHERE id = (
                   SELECT id FROM user_file
                   WHERE principal_id = $1 AND content_id = $2 AND deleted_at IS NOT NULL
                   ORDER BY uploaded_at DESC, id DESC
                   LIMIT 1)
               RETURNING id"#,
        )
        .bind(principal_id)
        .bind(content_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Restore one specific trashed claim owned by the principal.
    pub async fn recover_by_id(
        &self,
        principal_id: Uuid,
        user_file_id: Uuid,
    ) -> Result<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"UPDATE user_file SET deleted_at = NULL, uploaded_at = $3
               WHERE id = $2 AND principal_id = $1 AND deleted_at IS NOT NULL
               RETURNING id"#,
        )
        .bind(principal_id)
        .bind(user_file_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Hard-delete the newest claim for `(principal, content)`, active or
    /// trashed, returning the deleted row.
    pub async fn delete_newest_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        principal_id: Uuid,
        content_id: Uuid,
    ) -> Result<Option<UserFile>> {
        let row = sqlx::query(
            r#"DELETE FROM user_file
               WHERE id = (
                   SELECT id FROM user_file
                   WHERE principal_id = $1 AND content_id = $2
                   ORDER BY uploaded_at DESC, id DESC
                   LIMIT 1)
               RETURNING id, principal_id, content_id, folder_id, role, uploaded_at, deleted_at"#,
        )
        .bind(principal_id)
        .bind(content_id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(|r| user_file_from_row(&r)).transpose()
    }

    /// Hard-delete one specific claim owned by the principal.
    pub async fn delete_by_id_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        principal_id: Uuid,
        user_file_id: Uuid,
    ) -> Result<Option<UserFile>> {
        let row = sqlx::query(
            r#"DELETE FROM user_file
               WHERE id = $2 AND principal_id = $1
               RETURNING id, principal_id, content_id, folder_id, role, uploaded_at, deleted_at"#,
        )
        .bind(principal_id)
        .bind(user_file_id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(|r| user_file_from_row(&r)).transpose()
    }

    /// Distinct `(principal, content)` pairs with a claim placed in any of
    /// the given folders. Read before the bulk delete so content rows can be
    /// locked in a stable order first.
    pub async fn claims_in_folders_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        folder_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, Uuid)>> {
        let rows = sqlx::query(
            r#"SELECT DISTINCT principal_id, content_id
               FROM user_file
               WHERE folder_id = ANY($1)
               ORDER BY content_id, principal_id"#,
        )
        .bind(folder_ids)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("principal_id"), r.get("content_id")))
            .collect())
    }

    /// Hard-delete every claim placed in any of the given folders, returning
    /// the affected `(principal, content)` pairs for refcount reconciliation.
    pub async fn delete_in_folders_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        folder_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, Uuid)>> {
        let rows = sqlx::query(
            r#"DELETE FROM user_file
               WHERE folder_id = ANY($1)
               RETURNING principal_id, content_id"#,
        )
        .bind(folder_ids)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("principal_id"), r.get("content_id")))
            .collect())
    }

    /// Reassign every claim in the folder to the root.
    pub async fn clear_folder_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        folder_id: Uuid,
    ) -> Result<u64> {
        let result = sqlx::query("UPDATE user_file SET folder_id = NULL WHERE folder_id = $1")
            .bind(folder_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // LOOKUPS & LISTINGS
    // =========================================================================

    /// Fetch a claim by id.
    pub async fn get(&self, user_file_id: Uuid) -> Result<Option<UserFile>> {
        let row = sqlx::query(
            r#"SELECT id, principal_id, content_id, folder_id, role, uploaded_at, deleted_at
               FROM user_file WHERE id = $1"#,
        )
        .bind(user_file_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| user_file_from_row(&r)).transpose()
    }

    /// The principal's newest active claim on the content, if any.
    pub async fn newest_active(
        &self,
        principal_id: Uuid,
        content_id: Uuid,
    ) -> Result<Option<UserFile>> {
        let row = sqlx::query(
            r#"SELECT id, principal_id, content_id, folder_id, role, uploaded_at, deleted_at
               FROM user_file
               WHERE principal_id = $1 AND content_id = $2 AND deleted_at IS NULL
               ORDER BY uploaded_at DESC, id DESC
               LIMIT 1"#,
        )
        .bind(principal_id)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| user_file_from_row(&r)).transpose()
    }

    /// The principal's newest active claim on the content with this hash.
    ///
    /// The dedup short-circuit of the upload path: a hit means no blob
    /// write, no quota charge, no refcount change.
    pub async fn newest_active_by_hash(
        &self,
        principal_id: Uuid,
        hash: &str,
    ) -> Result<Option<UserFile>> {
        let row = sqlx::query(
            r#"SELECT uf.id, uf.principal_id, uf.content_id, uf.folder_id, uf.role,
                      uf.uploaded_at, uf.deleted_at
               FROM user_file uf
               JOIN content c ON c.id = uf.content_id
               WHERE uf.principal_id = $1 AND c.hash = $2 AND uf.deleted_at IS NULL
               ORDER BY uf.uploaded_at DESC, uf.id DESC
               LIMIT 1"#,
        )
        .bind(principal_id)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| user_file_from_row(&r)).transpose()
    }

    /// Snapshot of the principal's active claims, newest first.
    pub async fn list_active(&self, principal_id: Uuid) -> Result<Vec<UserFileEntry>> {
        self.list_entries(principal_id, ListFilter::Active, None).await
    }

    /// Snapshot of the principal's trash, newest first.
    pub async fn list_trashed(&self, principal_id: Uuid) -> Result<Vec<UserFileEntry>> {
        self.list_entries(principal_id, ListFilter::Trashed, None).await
    }

    /// Active claims placed directly in a folder (`None` = root).
    pub async fn list_in_folder(
        &self,
        principal_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Vec<UserFileEntry>> {
        self.list_entries(principal_id, ListFilter::Active, Some(folder_id))
            .await
    }

    async fn list_entries(
        &self,
        principal_id: Uuid,
        filter: ListFilter,
        folder: Option<Option<Uuid>>,
    ) -> Result<Vec<UserFileEntry>> {
        let state_clause = match filter {
            ListFilter::Active => "AND uf.deleted_at IS NULL",
            ListFilter::Trashed => "AND uf.deleted_at IS NOT NULL",
        };
        let folder_clause = match folder {
            None => "",
            Some(None) => "AND uf.folder_id IS NULL",
            Some(Some(_)) => "AND uf.folder_id = $2",
        };

        let sql = format!(
            r#"SELECT uf.id, uf.content_id, uf.folder_id, uf.role,
                      c.original_name AS name, c.mime_type, c.size_bytes,
                      uf.uploaded_at, uf.deleted_at
               FROM user_file uf
               JOIN content c ON c.id = uf.content_id
               WHERE uf.principal_id = $1 {state_clause} {folder_clause}
               ORDER BY uf.uploaded_at DESC, uf.id DESC"#
        );

        let mut query = sqlx::query(&sql).bind(principal_id);
        if let Some(Some(folder_id)) = folder {
            query = query.bind(folder_id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(entry_from_row).collect()
    }

    /// Move one active claim into a folder (`None` = root).
    ///
    /// Folder ownership is the caller's check; this only touches claims the
    /// principal owns.
    pub async fn move_to_folder(
        &self,
        principal_id: Uuid,
        user_file_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"UPDATE user_file SET folder_id = $3
               WHERE id = $2 AND principal_id = $1 AND deleted_at IS NULL
               RETURNING id"#,
        )
        .bind(principal_id)
        .bind(user_file_id)
        .bind(folder_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Principals holding an active owner-role claim on the content,
    /// longest-standing first. Feeds the download ledger's owner slot.
    pub async fn owners_of(&self, content_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"SELECT principal_id FROM user_file
               WHERE content_id = $1 AND deleted_at IS NULL AND role = 'owner'
               ORDER BY uploaded_at ASC, id ASC"#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.get("principal_id")).collect())
    }

    /// Folders in which any principal placed an active claim on the
    /// content. Feeds inherited-share resolution for files.
    pub async fn folders_containing(&self, content_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"SELECT DISTINCT folder_id FROM user_file
               WHERE content_id = $1 AND deleted_at IS NULL AND folder_id IS NOT NULL"#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.get("folder_id")).collect())
    }

    // =========================================================================
    // USAGE
    // =========================================================================

    /// Logical usage: Σ size over distinct contents with an active claim.
    pub async fn logical_usage(&self, principal_id: Uuid) -> Result<i64> {
        let usage: i64 = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(size_bytes), 0)::BIGINT FROM (
                   SELECT DISTINCT c.id, c.size_bytes
                   FROM user_file uf
                   JOIN content c ON c.id = uf.content_id
                   WHERE uf.principal_id = $1 AND uf.deleted_at IS NULL
               ) distinct_contents"#,
        )
        .bind(principal_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(usage)
    }

    /// Transaction-aware variant of `logical_usage`, for the quota gate
    /// inside the adopt transaction.
    pub async fn logical_usage_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        principal_id: Uuid,
    ) -> Result<i64> {
        let usage: i64 = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(size_bytes), 0)::BIGINT FROM (
                   SELECT DISTINCT c.id, c.size_bytes
                   FROM user_file uf
                   JOIN content c ON c.id = uf.content_id
                   WHERE uf.principal_id = $1 AND uf.deleted_at IS NULL
               ) distinct_contents"#,
        )
        .bind(principal_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(usage)
    }

    /// Attributed usage: each active claim carries its share of the physical
    /// bytes, `size / max(ref_count, 1)` (integer division).
    pub async fn attributed_usage(&self, principal_id: Uuid) -> Result<i64> {
        let usage: i64 = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(c.size_bytes / GREATEST(c.ref_count, 1)), 0)::BIGINT
               FROM user_file uf
               JOIN content c ON c.id = uf.content_id
               WHERE uf.principal_id = $1 AND uf.deleted_at IS NULL"#,
        )
        .bind(principal_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(usage)
    }
}

#[derive(Clone, Copy)]
enum ListFilter {
    Active,
    Trashed,
}

/// Parse a file role from its database string.
fn parse_file_role(s: &str) -> FileRole {
    match s {
        "viewer" => FileRole::Viewer,
        _ => FileRole::Owner,
    }
}

/// Convert a database row to a UserFile.
pub(crate) fn user_file_from_row(row: &sqlx::postgres::PgRow) -> Result<UserFile> {
    Ok(UserFile {
        id: row.get("id"),
        principal_id: row.get("principal_id"),
        content_id: row.get("content_id"),
        folder_id: row.get("folder_id"),
        role: parse_file_role(row.get("role")),
        uploaded_at: row.get("uploaded_at"),
        deleted_at: row.get("deleted_at"),
    })
}

fn entry_from_row(row: &sqlx::postgres::PgRow) -> Result<UserFileEntry> {
    Ok(UserFileEntry {
        id: row.get("id"),
        content_id: row.get("content_id"),
        folder_id: row.get("folder_id"),
        role: parse_file_role(row.get("role")),
        name: row.get("name"),
        mime_type: row.get("mime_type"),
        size_bytes: row.get("size_bytes"),
        uploaded_at: row.get("uploaded_at"),
        deleted_at: row.get("deleted_at"),
    })
}
