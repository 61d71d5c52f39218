//! Content repository: the globally deduplicated, hash-addressed rows.
//!
//! A content row exists once per unique byte sequence. `ref_count` is only
//! ever touched here, and only inside the caller's transaction with the row
//! locked, so adopt/purge races serialize on the row lock.

use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use depot_core::{Content, Error, Result};

/// Compute the lowercase SHA-256 hex address of a byte sequence.
pub fn compute_content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// PostgreSQL repository for content rows.
pub struct PgContentRepository {
    pool: Pool<Postgres>,
}

impl PgContentRepository {
    /// Create a new PgContentRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Look up a content by its hash.
    pub async fn find_by_hash(&self, hash: &str) -> Result<Option<Content>> {
        let row = sqlx::query(
            r#"SELECT id, hash, blob_locator, original_name, mime_type,
                      size_bytes, ref_count, created_at
               FROM content WHERE hash = $1"#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| content_from_row(&r)).transpose()
    }

    /// Fetch a content by id.
    pub async fn get(&self, id: Uuid) -> Result<Option<Content>> {
        let row = sqlx::query(
            r#"SELECT id, hash, blob_locator, original_name, mime_type,
                      size_bytes, ref_count, created_at
               FROM content WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| content_from_row(&r)).transpose()
    }

    /// Insert the content row for a hash if absent, then return the row
    /// locked `FOR UPDATE`.
    ///
    /// The insert is `ON CONFLICT DO NOTHING`, so two uploaders racing on
    /// the same bytes converge on one row; whoever loses the insert locks
    /// the winner's row.
    pub async fn ensure_locked_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        hash: &str,
        blob_locator: &str,
        original_name: &str,
        mime_type: &str,
        size_bytes: i64,
    ) -> Result<Content> {
        sqlx::query(
            r#"INSERT INTO content
                   (id, hash, blob_locator, original_name, mime_type, size_bytes, ref_count)
               VALUES ($1, $2, $3, $4, $5, $6, 0)
               ON CONFLICT (hash) DO NOTHING"#,
        )
        .bind(Uuid::now_v7())
        .bind(hash)
        .bind(blob_locator)
        .bind(original_name)
        .bind(mime_type)
        .bind(size_bytes)
        .execute(&mut **tx)
        .await?;

        self.lock_by_hash_tx(tx, hash)
            .await?
            .ok_or_else(|| Error::Internal(format!("content row vanished for hash {hash}")))
    }

    /// Lock a content row by id and return it.
    pub async fn lock_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Content>> {
        let row = sqlx::query(
            r#"SELECT id, hash, blob_locator, original_name, mime_type,
                      size_bytes, ref_count, created_at
               FROM content WHERE id = $1
               FOR UPDATE"#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(|r| content_from_row(&r)).transpose()
    }

    /// Lock a content row by hash and return it.
    pub async fn lock_by_hash_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        hash: &str,
    ) -> Result<Option<Content>> {
        let row = sqlx::query(
            r#"SELECT id, hash, blob_locator, original_name, mime_type,
                      size_bytes, ref_count, created_at
               FROM content WHERE hash = $1
               FOR UPDATE"#,
        )
        .bind(hash)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(|r| content_from_row(&r)).transpose()
    }

    /// Increment the reference count; returns the new value.
    pub async fn increment_ref_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<i32> {
        let count: i32 = sqlx::query_scalar(
            "UPDATE content SET ref_count = ref_count + 1 WHERE id = $1 RETURNING ref_count",
        )
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(count)
    }

    /// Decrement the reference count, floored at zero; returns the new value.
    pub async fn decrement_ref_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<i32> {
        let count: i32 = sqlx::query_scalar(
            r#"UPDATE content SET ref_count = GREATEST(ref_count - 1, 0)
               WHERE id = $1 RETURNING ref_count"#,
        )
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(count)
    }

    /// Current reference count, if the row still exists.
    pub async fn ref_count(&self, id: Uuid) -> Result<Option<i32>> {
        let count = sqlx::query_scalar::<_, i32>("SELECT ref_count FROM content WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(count)
    }

    /// Delete the row only while nothing references it.
    ///
    /// Returns whether the row went away; a concurrent adoption that bumped
    /// `ref_count` wins the race and the delete is a no-op.
    pub async fn destroy_if_unreferenced(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM content WHERE id = $1 AND ref_count = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Convert a database row to a Content.
pub(crate) fn content_from_row(row: &sqlx::postgres::PgRow) -> Result<Content> {
    Ok(Content {
        id: row.get("id"),
        hash: row.get("hash"),
        blob_locator: row.get("blob_locator"),
        original_name: row.get("original_name"),
        mime_type: row.get("mime_type"),
        size_bytes: row.get("size_bytes"),
        ref_count: row.get("ref_count"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_lowercase_sha256_hex() {
        let hash = compute_content_hash(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_differs_per_content() {
        assert_ne!(compute_content_hash(b"a"), compute_content_hash(b"b"));
    }
}
