//! Database connection pool setup.
//!
//! One pool per process, shared by every parallel request handler. Sizing
//! comes from [`depot_core::defaults`]; the only knob callers get is the
//! connection count, for tests that want a smaller footprint.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use depot_core::defaults::{DB_ACQUIRE_TIMEOUT_SECS, DB_MAX_CONNECTIONS};
use depot_core::{Error, Result};

/// Connect a pool with the standard sizing.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_sized(database_url, DB_MAX_CONNECTIONS).await
}

/// Connect a pool with an explicit connection count.
pub async fn create_pool_sized(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS))
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        max_connections,
        "database pool ready"
    );
    Ok(pool)
}
