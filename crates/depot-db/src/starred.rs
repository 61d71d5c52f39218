//! Starred-item repository.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use depot_core::{Result, StarKind, StarredItem};

/// PostgreSQL repository for starred items.
pub struct PgStarredRepository {
    pool: Pool<Postgres>,
}

impl PgStarredRepository {
    /// Create a new PgStarredRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Star a target; idempotent on the `(principal, kind, target)` key.
    pub async fn star(&self, principal_id: Uuid, kind: StarKind, target_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO starred_item (id, principal_id, kind, target_id, starred_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (principal_id, kind, target_id) DO NOTHING"#,
        )
        .bind(Uuid::now_v7())
        .bind(principal_id)
        .bind(kind.to_string())
        .bind(target_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a star; idempotent.
    pub async fn unstar(&self, principal_id: Uuid, kind: StarKind, target_id: Uuid) -> Result<()> {
        sqlx::query(
            "DELETE FROM starred_item WHERE principal_id = $1 AND kind = $2 AND target_id = $3",
        )
        .bind(principal_id)
        .bind(kind.to_string())
        .bind(target_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All stars of a principal, newest first.
    pub async fn list(&self, principal_id: Uuid) -> Result<Vec<StarredItem>> {
        let rows = sqlx::query(
            r#"SELECT id, principal_id, kind, target_id, starred_at
               FROM starred_item WHERE principal_id = $1
               ORDER BY starred_at DESC"#,
        )
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| StarredItem {
                id: r.get("id"),
                principal_id: r.get("principal_id"),
                kind: parse_star_kind(r.get("kind")),
                target_id: r.get("target_id"),
                starred_at: r.get("starred_at"),
            })
            .collect())
    }

    /// Whether the principal has starred the target.
    pub async fn is_starred(
        &self,
        principal_id: Uuid,
        kind: StarKind,
        target_id: Uuid,
    ) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(
                   SELECT 1 FROM starred_item
                   WHERE principal_id = $1 AND kind = $2 AND target_id = $3)"#,
        )
        .bind(principal_id)
        .bind(kind.to_string())
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }
}

fn parse_star_kind(s: &str) -> StarKind {
    match s {
        "folder" => StarKind::Folder,
        _ => StarKind::File,
    }
}
