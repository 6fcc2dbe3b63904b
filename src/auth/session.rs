//! Session resolution and lifecycle.
//!
//! Tokens are opaque and only their SHA-256 is stored. Lookup is always
//! scoped to a portal, so a token issued for the admin portal can never
//! authenticate against the GWI portal even for the same staff account.
//!
//! The principal is rebuilt from current account state on every resolution.
//! Nothing about roles or activity is cached, which makes deactivation and
//! role changes visible on the very next request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::principal::{AdminPrincipal, EndUser, Principal};
use super::token::{generate_token, hash_token};
use crate::config::SessionConfig;
use crate::database::models::SessionRecord;
use crate::database::{DatabaseError, PrincipalStore, SessionStore};
use crate::types::{Portal, PrincipalKind};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, unknown or revoked token
    #[error("authentication required")]
    Unauthenticated,

    #[error("session expired")]
    SessionExpired,

    /// The account behind the session was deactivated
    #[error("principal is inactive")]
    PrincipalInactive,

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Returned once at issuance; the raw token is never retrievable again
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub session_id: Uuid,
    pub portal: Portal,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionResolver<'a, S: ?Sized> {
    store: &'a S,
    config: &'a SessionConfig,
}

impl<'a, S> SessionResolver<'a, S>
where
    S: SessionStore + PrincipalStore + ?Sized,
{
    pub fn new(store: &'a S, config: &'a SessionConfig) -> Self {
        Self { store, config }
    }

    pub async fn resolve(&self, portal: Portal, token: Option<&str>) -> Result<Principal, AuthError> {
        self.resolve_at(portal, token, Utc::now()).await
    }

    /// Resolve a bearer token presented to `portal` as of `now`
    pub async fn resolve_at(
        &self,
        portal: Portal,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Principal, AuthError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        let session = self
            .store
            .find_session(portal, &hash_token(token))
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        // Stores filter by portal already; re-check so a misbehaving store
        // cannot hand one portal's session to another.
        if session.portal != portal
            || session.principal_kind != portal.principal_kind()
            || session.revoked_at.is_some()
        {
            return Err(AuthError::Unauthenticated);
        }

        if session.is_expired_at(now) {
            debug!(portal = %portal, session_id = %session.id, "session expired");
            return Err(AuthError::SessionExpired);
        }

        let principal = self.load_principal(portal, session.principal_id).await?;

        if self.config.sliding_expiry {
            self.maybe_extend(portal, &session, now).await?;
        }

        debug!(portal = %portal, principal_id = %principal.id(), "session resolved");
        Ok(principal)
    }

    pub async fn issue(&self, portal: Portal, principal_id: Uuid) -> Result<IssuedSession, AuthError> {
        self.issue_at(portal, principal_id, Utc::now()).await
    }

    /// Create a session for an existing, active principal
    pub async fn issue_at(
        &self,
        portal: Portal,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, AuthError> {
        self.load_principal(portal, principal_id).await?;

        let token = generate_token();
        let record = SessionRecord {
            id: Uuid::new_v4(),
            token_hash: hash_token(&token),
            portal,
            principal_id,
            principal_kind: portal.principal_kind(),
            created_at: now,
            expires_at: now + self.config.ttl(portal),
            revoked_at: None,
        };
        self.store.insert_session(&record).await?;

        info!(portal = %portal, principal_id = %principal_id, session_id = %record.id, "session issued");
        Ok(IssuedSession {
            session_id: record.id,
            portal,
            token,
            expires_at: record.expires_at,
        })
    }

    /// Logout. Unknown tokens are not an error.
    pub async fn revoke(&self, portal: Portal, token: &str) -> Result<bool, AuthError> {
        let removed = self.store.delete_session(portal, &hash_token(token)).await?;
        if removed {
            info!(portal = %portal, "session revoked");
        }
        Ok(removed)
    }

    /// Revoke every session a principal holds on any portal. Revoked rows
    /// stay until the next sweep.
    pub async fn revoke_all(&self, principal_id: Uuid) -> Result<u64, AuthError> {
        let count = self
            .store
            .revoke_sessions_for_principal(principal_id, Utc::now())
            .await?;
        info!(principal_id = %principal_id, count, "all sessions revoked");
        Ok(count)
    }

    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let count = self.store.delete_expired_sessions(now).await?;
        info!(count, "expired sessions swept");
        Ok(count)
    }

    async fn load_principal(&self, portal: Portal, principal_id: Uuid) -> Result<Principal, AuthError> {
        match portal.principal_kind() {
            PrincipalKind::User => {
                let user = self
                    .store
                    .find_user(principal_id)
                    .await?
                    .ok_or(AuthError::Unauthenticated)?;
                if !user.is_active {
                    warn!(portal = %portal, principal_id = %principal_id, "inactive user presented a session");
                    return Err(AuthError::PrincipalInactive);
                }
                Ok(Principal::EndUser(EndUser::from(user)))
            }
            PrincipalKind::Admin => {
                let admin = self
                    .store
                    .find_admin(principal_id)
                    .await?
                    .ok_or(AuthError::Unauthenticated)?;
                if !admin.is_active {
                    warn!(portal = %portal, principal_id = %principal_id, "inactive admin presented a session");
                    return Err(AuthError::PrincipalInactive);
                }
                Ok(Principal::admin_for(portal, AdminPrincipal::from(admin)))
            }
        }
    }

    async fn maybe_extend(
        &self,
        portal: Portal,
        session: &SessionRecord,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let ttl = self.config.ttl(portal);
        if session.expires_at - now < ttl / 2 {
            self.store.extend_session(session.id, now + ttl).await?;
            debug!(session_id = %session.id, "session expiry extended");
        }
        Ok(())
    }
}
