//! Activity tracking and the recent-activity feed.
//!
//! Appends ride on the success of the underlying action; when the ledger
//! itself fails the error is logged and swallowed — a missing analytics row
//! must never fail a user-facing operation.

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use depot_core::{ActivityKind, AuthPrincipal, RecentActivity, Result};
use depot_db::PgActivityRepository;

use crate::permissions::{PermissionResolver, Subject};

/// Records and aggregates per-principal activity.
pub struct ActivityService {
    activity: PgActivityRepository,
    permissions: PermissionResolver,
}

impl ActivityService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            activity: PgActivityRepository::new(pool.clone()),
            permissions: PermissionResolver::new(pool),
        }
    }

    /// Record a preview or download touch. Fire-and-forget: access is still
    /// checked (tracking is not an oracle for other people's files), but a
    /// ledger failure is swallowed.
    pub async fn track(
        &self,
        principal: &AuthPrincipal,
        content_id: Uuid,
        kind: ActivityKind,
    ) -> Result<()> {
        self.permissions
            .require_access(principal.id, &principal.email, Subject::File(content_id))
            .await?;

        if let Err(e) = self
            .activity
            .record_activity(principal.id, content_id, kind)
            .await
        {
            warn!(
                subsystem = "activity",
                op = "track",
                principal_id = %principal.id,
                content_id = %content_id,
                error = %e,
                "ledger append failed"
            );
        }
        Ok(())
    }

    /// The caller's recently touched contents, newest-touch first.
    pub async fn recent(
        &self,
        principal: &AuthPrincipal,
        limit: Option<i64>,
    ) -> Result<Vec<RecentActivity>> {
        self.activity.recent(principal.id, limit).await
    }
}
