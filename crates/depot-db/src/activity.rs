//! Append-only activity and download ledgers, plus the recent-activity
//! aggregation.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use depot_core::defaults::{RECENT_ACTIVITY_LIMIT, RECENT_ACTIVITY_LIMIT_MAX};
use depot_core::{ActivityKind, DownloadSource, RecentActivity, RequestContext, Result};

/// PostgreSQL repository for the activity and download ledgers.
pub struct PgActivityRepository {
    pool: Pool<Postgres>,
}

impl PgActivityRepository {
    /// Create a new PgActivityRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Append one activity event.
    pub async fn record_activity(
        &self,
        principal_id: Uuid,
        content_id: Uuid,
        kind: ActivityKind,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO activity_event (id, principal_id, content_id, kind, occurred_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(Uuid::now_v7())
        .bind(principal_id)
        .bind(content_id)
        .bind(kind.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append one download event for a shared or public fetch.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_download(
        &self,
        content_id: Uuid,
        owner_id: Uuid,
        downloader_id: Option<Uuid>,
        source: DownloadSource,
        share_token: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO download_event
                   (id, content_id, owner_id, downloader_id, source, share_token,
                    ip, user_agent, occurred_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(Uuid::now_v7())
        .bind(content_id)
        .bind(owner_id)
        .bind(downloader_id)
        .bind(source.to_string())
        .bind(share_token)
        .bind(&ctx.ip)
        .bind(&ctx.user_agent)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The principal's recently touched contents: newest event per content
    /// with a touch count, ordered last-seen first with a stable content-id
    /// tie-break. The limit defaults to 10 and is clamped to 100.
    pub async fn recent(
        &self,
        principal_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<RecentActivity>> {
        let limit = limit
            .unwrap_or(RECENT_ACTIVITY_LIMIT)
            .clamp(1, RECENT_ACTIVITY_LIMIT_MAX);

        let rows = sqlx::query(
            r#"SELECT a.content_id, c.original_name AS name, c.mime_type, c.size_bytes,
                      COUNT(*) AS event_count, MAX(a.occurred_at) AS last_at
               FROM activity_event a
               JOIN content c ON c.id = a.content_id
               WHERE a.principal_id = $1
               GROUP BY a.content_id, c.original_name, c.mime_type, c.size_bytes
               ORDER BY last_at DESC, a.content_id
               LIMIT $2"#,
        )
        .bind(principal_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| RecentActivity {
                content_id: r.get("content_id"),
                name: r.get("name"),
                mime_type: r.get("mime_type"),
                size_bytes: r.get("size_bytes"),
                event_count: r.get("event_count"),
                last_at: r.get("last_at"),
            })
            .collect())
    }

    /// Total downloads recorded against a content, for owner dashboards.
    pub async fn download_count(&self, content_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM download_event WHERE content_id = $1")
                .bind(content_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
