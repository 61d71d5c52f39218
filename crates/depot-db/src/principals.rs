//! Principal repository.
//!
//! Local (password) and federated accounts live in one table with a `kind`
//! tag; everything downstream addresses principals by id, and email lookups
//! match across both kinds.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use depot_core::{normalize_email, Principal, PrincipalKind, Result};

use crate::conflict_on_unique;

/// Parameters for registering a principal.
#[derive(Debug, Clone)]
pub struct CreatePrincipalRequest {
    pub email: String,
    pub display_name: Option<String>,
    pub kind: PrincipalKind,
    /// Present for local accounts only; already hashed by the caller.
    pub password_hash: Option<String>,
}

/// PostgreSQL repository for principals.
pub struct PgPrincipalRepository {
    pool: Pool<Postgres>,
}

impl PgPrincipalRepository {
    /// Create a new PgPrincipalRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Register a principal. Emails are stored normalized; a duplicate
    /// registration surfaces as `Conflict`.
    pub async fn create(&self, req: CreatePrincipalRequest) -> Result<Principal> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let email = normalize_email(&req.email);

        sqlx::query(
            r#"INSERT INTO principal (id, email, display_name, kind, password_hash, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(id)
        .bind(&email)
        .bind(&req.display_name)
        .bind(req.kind.to_string())
        .bind(&req.password_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, &format!("principal {email} already exists")))?;

        Ok(Principal {
            id,
            email,
            display_name: req.display_name,
            kind: req.kind,
            created_at: now,
        })
    }

    /// Fetch a principal by id.
    pub async fn get(&self, id: Uuid) -> Result<Option<Principal>> {
        let row = sqlx::query(
            r#"SELECT id, email, display_name, kind, created_at
               FROM principal WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| principal_from_row(&r)))
    }

    /// Case-insensitive email lookup across both account kinds.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Principal>> {
        let row = sqlx::query(
            r#"SELECT id, email, display_name, kind, created_at
               FROM principal WHERE LOWER(email) = $1"#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| principal_from_row(&r)))
    }

    /// Stored password hash for a local account, for the transport's
    /// credential check.
    pub async fn password_hash(&self, id: Uuid) -> Result<Option<String>> {
        let hash: Option<Option<String>> =
            sqlx::query_scalar("SELECT password_hash FROM principal WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash.flatten())
    }
}

fn parse_principal_kind(s: &str) -> PrincipalKind {
    match s {
        "local" => PrincipalKind::Local,
        _ => PrincipalKind::Federated,
    }
}

fn principal_from_row(row: &sqlx::postgres::PgRow) -> Principal {
    Principal {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        kind: parse_principal_kind(row.get("kind")),
        created_at: row.get("created_at"),
    }
}
