//! Per-principal storage accounting.
//!
//! Logical usage (distinct content bytes with an active claim) is what the
//! quota enforces; attributed usage (each claim's share of the physical
//! bytes after dedup) only feeds the savings report.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use depot_core::{AuthPrincipal, DepotConfig, Result, StorageUsage};
use depot_db::PgUserFileRepository;

/// Computes usage and savings for the storage dashboard.
pub struct QuotaAccountant {
    user_files: PgUserFileRepository,
    config: Arc<DepotConfig>,
}

impl QuotaAccountant {
    pub fn new(pool: PgPool, config: Arc<DepotConfig>) -> Self {
        Self {
            user_files: PgUserFileRepository::new(pool),
            config,
        }
    }

    /// Logical bytes currently counted against the principal's budget.
    pub async fn logical_usage(&self, principal_id: Uuid) -> Result<i64> {
        self.user_files.logical_usage(principal_id).await
    }

    /// The `{used, quota, percent, savings, savings_percent}` report.
    pub async fn usage(&self, principal: &AuthPrincipal) -> Result<StorageUsage> {
        let used = self.user_files.logical_usage(principal.id).await?;
        let attributed = self.user_files.attributed_usage(principal.id).await?;
        Ok(build_report(used, attributed, self.config.per_user_quota_bytes))
    }
}

fn build_report(used: i64, attributed: i64, quota: i64) -> StorageUsage {
    let savings = (used - attributed).max(0);
    let percent_used = if quota > 0 {
        (used as f64 / quota as f64) * 100.0
    } else {
        0.0
    };
    let savings_percent = if used > 0 {
        (savings as f64 / used as f64) * 100.0
    } else {
        0.0
    };

    StorageUsage {
        used_bytes: used,
        quota_bytes: quota,
        percent_used,
        savings_bytes: savings,
        savings_percent,
    }
}
