//! # depot-service
//!
//! Coordination layer of the depot file plane: everything the transport
//! calls, expressed as typed service methods over the metadata and object
//! stores.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use depot_core::DepotConfig;
//! use depot_db::create_pool;
//! use depot_service::Depot;
//! use depot_store::S3ObjectStore;
//!
//! let config = Arc::new(DepotConfig::from_env()?);
//! let pool = create_pool(&std::env::var("DATABASE_URL")?).await?;
//! let store = Arc::new(S3ObjectStore::connect(&config).await?);
//! let depot = Depot::new(pool, store, config);
//!
//! let outcome = depot.uploads.upload_bytes(&principal, request, &bytes).await?;
//! ```

pub mod activity;
pub mod downloads;
pub mod folders;
pub mod identity;
pub mod lifecycle;
pub mod links;
pub mod permissions;
pub mod quota;
pub mod sharing;
pub mod upload;

use std::sync::Arc;

use sqlx::PgPool;

use depot_core::DepotConfig;
use depot_db::{
    PgContentRepository, PgPrincipalRepository, PgStarredRepository, PgUserFileRepository,
};
use depot_store::ObjectStore;

pub use activity::ActivityService;
pub use downloads::DownloadService;
pub use folders::FolderService;
pub use identity::TrustedHeaderIdentity;
pub use lifecycle::LifecycleService;
pub use links::{PublicLinkService, ResolvedLink, ResolvedSubject};
pub use permissions::{PermissionResolver, Subject};
pub use quota::QuotaAccountant;
pub use sharing::ShareService;
pub use upload::{UploadCoordinator, UploadOutcome};

/// The assembled service layer: one instance per process, shared across
/// request handlers.
pub struct Depot {
    pub config: Arc<DepotConfig>,
    pub store: Arc<dyn ObjectStore>,

    // Coordination services
    pub uploads: UploadCoordinator,
    pub lifecycle: LifecycleService,
    pub quota: QuotaAccountant,
    pub permissions: PermissionResolver,
    pub links: PublicLinkService,
    pub sharing: ShareService,
    pub folders: FolderService,
    pub activity: ActivityService,
    pub downloads: DownloadService,

    // Repositories the transport reads directly (listings, account lookups)
    pub principals: PgPrincipalRepository,
    pub contents: PgContentRepository,
    pub user_files: PgUserFileRepository,
    pub starred: PgStarredRepository,
}

impl Depot {
    /// Wire every service over one pool, one object store, and the
    /// immutable config snapshot.
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>, config: Arc<DepotConfig>) -> Self {
        Self {
            uploads: UploadCoordinator::new(pool.clone(), store.clone(), config.clone()),
            lifecycle: LifecycleService::new(pool.clone(), store.clone()),
            quota: QuotaAccountant::new(pool.clone(), config.clone()),
            permissions: PermissionResolver::new(pool.clone()),
            links: PublicLinkService::new(pool.clone()),
            sharing: ShareService::new(pool.clone()),
            folders: FolderService::new(pool.clone(), store.clone()),
            activity: ActivityService::new(pool.clone()),
            downloads: DownloadService::new(pool.clone(), store.clone()),
            principals: PgPrincipalRepository::new(pool.clone()),
            contents: PgContentRepository::new(pool.clone()),
            user_files: PgUserFileRepository::new(pool.clone()),
            starred: PgStarredRepository::new(pool),
            config,
            store,
        }
    }
}
