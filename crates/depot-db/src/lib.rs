//! # depot-db
//!
//! PostgreSQL metadata plane for depot.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for every persisted entity
//! - The transactional dedup/refcount engine (adopt, purge, claim state)
//! - Bounded folder-tree descent
//!
//! ## Example
//!
//! ```rust,ignore
//! use depot_db::{create_pool, PgContentRepository, PgUserFileRepository};
//!
//! let pool = create_pool("postgres://localhost/depot").await?;
//! let contents = PgContentRepository::new(pool.clone());
//! let user_files = PgUserFileRepository::new(pool.clone());
//!
//! let mut tx = pool.begin().await?;
//! let content = contents.lock_by_hash_tx(&mut tx, &hash).await?;
//! ```

pub mod activity;
pub mod contents;
pub mod folders;
pub mod pool;
pub mod principals;
pub mod public_links;
pub mod shares;
pub mod starred;
pub mod user_files;

// Test fixtures for integration tests.
// Always compiled so integration tests (in tests/) and downstream crates can
// use the shared DATABASE_URL helper.
pub mod test_fixtures;

// Re-export core types
pub use depot_core::*;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Translate a unique-constraint violation into `Error::Conflict`, leaving
/// every other database failure untouched.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict(what.to_string()),
        _ => Error::Database(e),
    }
}

// Re-export repository implementations
pub use activity::PgActivityRepository;
pub use contents::{compute_content_hash, PgContentRepository};
pub use folders::PgFolderRepository;
pub use pool::{create_pool, create_pool_sized};
pub use principals::{CreatePrincipalRequest, PgPrincipalRepository};
pub use public_links::PgPublicLinkRepository;
pub use shares::PgShareRepository;
pub use starred::PgStarredRepository;
pub use user_files::PgUserFileRepository;
