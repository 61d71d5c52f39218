//! Shared setup for service-layer integration tests: live PostgreSQL from
//! `DATABASE_URL`, an in-memory object store, and a fixed config snapshot.

#![allow(dead_code)]

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use depot_core::{AuthPrincipal, DepotConfig, PrincipalKind};
use depot_db::test_fixtures::test_pool;
use depot_db::{CreatePrincipalRequest, PgPrincipalRepository};
use depot_service::Depot;
use depot_store::{MemoryObjectStore, ObjectStore};

pub const MIB: usize = 1024 * 1024;

pub fn test_config() -> DepotConfig {
    DepotConfig {
        object_store_endpoint: "memory://".to_string(),
        bucket: "depot-test".to_string(),
        public_endpoint_override: None,
        per_user_quota_bytes: 20 * MIB as i64,
        admin_email: "admin@test.example".to_string(),
        token_secret: "test-secret".to_string(),
    }
}

/// A wired service layer over the test database and an in-memory store.
/// The raw store handle comes back too, for blob-level assertions.
pub async fn test_depot() -> (Depot, Arc<MemoryObjectStore>, PgPool) {
    dotenvy::dotenv().ok();
    let pool = test_pool().await;
    let memory = Arc::new(MemoryObjectStore::new());
    let store: Arc<dyn ObjectStore> = memory.clone();
    let depot = Depot::new(pool.clone(), store, Arc::new(test_config()));
    (depot, memory, pool)
}

/// Register a fresh principal and return the identity the transport would
/// hand the core.
pub async fn auth(pool: &PgPool, tag: &str) -> AuthPrincipal {
    let repo = PgPrincipalRepository::new(pool.clone());
    let principal = repo
        .create(CreatePrincipalRequest {
            email: format!("{tag}-{}@test.example", Uuid::new_v4()),
            display_name: Some(tag.to_string()),
            kind: PrincipalKind::Federated,
            password_hash: None,
        })
        .await
        .expect("create principal");

    AuthPrincipal {
        id: principal.id,
        email: principal.email,
        is_admin: false,
    }
}

/// Unique payload of the given size: a random tail behind a fixed leading
/// byte no file format claims, so uploads never trip magic-byte detection.
pub fn payload(tag: &str, size: usize) -> Vec<u8> {
    let seed = tag.as_bytes();
    let uniq = Uuid::new_v4();
    let mut data = Vec::with_capacity(size);
    data.push(0xA5);
    data.extend_from_slice(uniq.as_bytes());
    while data.len() < size {
        data.push(seed[data.len() % seed.len()] ^ (data.len() as u8));
    }
    data.truncate(size);
    data
}
