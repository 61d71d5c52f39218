//! Public-link repository: opaque tokens granting anonymous access.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use depot_core::defaults::LINK_TOKEN_BYTES;
use depot_core::{LinkSubject, PublicLink, Result};

use crate::conflict_on_unique;

/// PostgreSQL repository for public links.
pub struct PgPublicLinkRepository {
    pool: Pool<Postgres>,
}

impl PgPublicLinkRepository {
    /// Create a new PgPublicLinkRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Generate an unguessable URL-safe token: 128 random bits, unpadded
    /// base64.
    fn mint_token() -> String {
        let mut bytes = [0u8; LINK_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Issue a link for a subject.
    pub async fn create(
        &self,
        subject_kind: LinkSubject,
        subject_id: Uuid,
        owner_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<PublicLink> {
        let id = Uuid::now_v7();
        let token = Self::mint_token();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO public_link
                   (id, subject_kind, subject_id, owner_id, token, created_at, expires_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(id)
        .bind(subject_kind.to_string())
        .bind(subject_id)
        .bind(owner_id)
        .bind(&token)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "public link token collision"))?;

        Ok(PublicLink {
            id,
            subject_kind,
            subject_id,
            owner_id,
            token,
            created_at: now,
            expires_at,
            revoked_at: None,
            access_count: 0,
        })
    }

    /// Revoke the most recently created non-revoked link for the subject.
    ///
    /// Returns the revoked link id, or `None` when no active link exists
    /// (the caller decides whether that is an error).
    pub async fn revoke_newest(
        &self,
        subject_kind: LinkSubject,
        subject_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"UPDATE public_link SET revoked_at = $4
               WHERE id = (
                   SELECT id FROM public_link
                   WHERE subject_kind = $1 AND subject_id = $2 AND owner_id = $3
                     AND revoked_at IS NULL
                   ORDER BY created_at DESC, id DESC
                   LIMIT 1)
               RETURNING id"#,
        )
        .bind(subject_kind.to_string())
        .bind(subject_id)
        .bind(owner_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Constant single-index lookup by token.
    pub async fn resolve(&self, token: &str) -> Result<Option<PublicLink>> {
        let row = sqlx::query(
            r#"SELECT id, subject_kind, subject_id, owner_id, token,
                      created_at, expires_at, revoked_at, access_count
               FROM public_link WHERE token = $1"#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| link_from_row(&r)))
    }

    /// The newest live link on a subject, for owners re-requesting a link.
    pub async fn newest_live(
        &self,
        subject_kind: LinkSubject,
        subject_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PublicLink>> {
        let row = sqlx::query(
            r#"SELECT id, subject_kind, subject_id, owner_id, token,
                      created_at, expires_at, revoked_at, access_count
               FROM public_link
               WHERE subject_kind = $1 AND subject_id = $2
                 AND revoked_at IS NULL
                 AND (expires_at IS NULL OR expires_at > $3)
               ORDER BY created_at DESC, id DESC
               LIMIT 1"#,
        )
        .bind(subject_kind.to_string())
        .bind(subject_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| link_from_row(&r)))
    }

    /// Fire-and-forget counter bump after a successful traversal or
    /// download. Not transactional with the action; approximate counts are
    /// fine.
    pub async fn increment_access(&self, token: &str) -> Result<()> {
        sqlx::query("UPDATE public_link SET access_count = access_count + 1 WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn parse_link_subject(s: &str) -> LinkSubject {
    match s {
        "folder" => LinkSubject::Folder,
        _ => LinkSubject::File,
    }
}

fn link_from_row(row: &sqlx::postgres::PgRow) -> PublicLink {
    PublicLink {
        id: row.get("id"),
        subject_kind: parse_link_subject(row.get("subject_kind")),
        subject_id: row.get("subject_id"),
        owner_id: row.get("owner_id"),
        token: row.get("token"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        revoked_at: row.get("revoked_at"),
        access_count: row.get("access_count"),
    }
}
