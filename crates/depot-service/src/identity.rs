//! Identity provider backed by the principal table.
//!
//! The transport owns credential verification (JWT, OAuth, sessions). This
//! implementation covers the deployment where a fronting proxy has already
//! verified the user and asserts their email in a trusted header: the
//! credential handed in IS the verified email. Admin standing is derived
//! from the configured admin address, never stored.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use depot_core::{normalize_email, AuthPrincipal, DepotConfig, Error, IdentityProvider, Result};
use depot_db::PgPrincipalRepository;

/// Resolves proxy-asserted emails to principals.
pub struct TrustedHeaderIdentity {
    principals: PgPrincipalRepository,
    config: Arc<DepotConfig>,
}

impl TrustedHeaderIdentity {
    pub fn new(pool: PgPool, config: Arc<DepotConfig>) -> Self {
        Self {
            principals: PgPrincipalRepository::new(pool),
            config,
        }
    }
}

#[async_trait]
impl IdentityProvider for TrustedHeaderIdentity {
    async fn authenticate(&self, credential: &str) -> Result<AuthPrincipal> {
        let email = normalize_email(credential);
        if email.is_empty() {
            return Err(Error::Unauthenticated("empty identity header".to_string()));
        }

        let principal = self
            .principals
            .find_by_email(&email)
            .await?
            .ok_or_else(|| Error::Unauthenticated(format!("unknown account {email}")))?;

        Ok(AuthPrincipal {
            id: principal.id,
            is_admin: self.config.is_admin(&principal.email),
            email: principal.email,
        })
    }
}
