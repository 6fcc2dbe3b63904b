//! Tenant resolution: which organization a dashboard request acts on.
//!
//! The current organization is always an explicit argument. An explicit
//! request (the `x-organization-id` header) is strict: the caller must be a
//! member. A hint (the `currentOrgId` cookie) is lenient: if it points at an
//! organization the user no longer belongs to, resolution falls through to
//! the earliest membership instead of failing.
//!
//! Hierarchy is never walked here; see [`crate::features`] for that.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::principal::EndUser;
use crate::database::models::{Membership, Organization};
use crate::database::{DatabaseError, MembershipStore, OrganizationStore};

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("user has no organization")]
    NoOrganization,

    #[error("not a member of the requested organization")]
    NotAMember,

    #[error("organization not found")]
    OrganizationNotFound,

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Effective organization for a request plus the caller's membership in it
#[derive(Debug, Clone, Serialize)]
pub struct TenantContext {
    pub organization: Organization,
    pub membership: Membership,
}

pub struct TenantResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> TenantResolver<'a, S>
where
    S: OrganizationStore + MembershipStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve the organization a user acts on.
    ///
    /// Order: `requested` (strict) → `hint` (lenient) → earliest membership by
    /// `joined_at`, then organization id. Archived organizations are skipped by
    /// the fallback and reported as not found when requested explicitly.
    pub async fn resolve_org(
        &self,
        user: &EndUser,
        requested: Option<&str>,
        hint: Option<&str>,
    ) -> Result<TenantContext, TenantError> {
        if let Some(requested) = requested.map(str::trim).filter(|s| !s.is_empty()) {
            return self.resolve_requested(user, requested).await;
        }

        let memberships = self.memberships_in_order(user.id).await?;
        if memberships.is_empty() {
            return Err(TenantError::NoOrganization);
        }

        let hinted = hint
            .and_then(|h| Uuid::parse_str(h.trim()).ok())
            .and_then(|id| memberships.iter().find(|m| m.organization_id == id));

        // Hinted membership first, then the rest in deterministic order
        let candidates = hinted.into_iter().chain(
            memberships
                .iter()
                .filter(|m| Some(m.organization_id) != hinted.map(|h| h.organization_id)),
        );

        for membership in candidates {
            if let Some(organization) = self.active_organization(membership.organization_id).await? {
                debug!(user_id = %user.id, organization_id = %organization.id, "tenant resolved by fallback");
                return Ok(TenantContext {
                    organization,
                    membership: membership.clone(),
                });
            }
        }

        Err(TenantError::NoOrganization)
    }

    /// Every active organization the user belongs to, in fallback order
    pub async fn list_organizations(&self, user: &EndUser) -> Result<Vec<TenantContext>, TenantError> {
        let memberships = self.memberships_in_order(user.id).await?;
        let mut contexts = Vec::with_capacity(memberships.len());
        for membership in memberships {
            if let Some(organization) = self.active_organization(membership.organization_id).await? {
                contexts.push(TenantContext {
                    organization,
                    membership,
                });
            }
        }
        Ok(contexts)
    }

    async fn resolve_requested(&self, user: &EndUser, requested: &str) -> Result<TenantContext, TenantError> {
        // An id that does not parse cannot have a membership row
        let organization_id = Uuid::parse_str(requested).map_err(|_| TenantError::NotAMember)?;

        let membership = self
            .store
            .find_membership(user.id, organization_id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %user.id, organization_id = %organization_id, "organization requested without membership");
                TenantError::NotAMember
            })?;

        let organization = self
            .active_organization(organization_id)
            .await?
            .ok_or(TenantError::OrganizationNotFound)?;

        Ok(TenantContext {
            organization,
            membership,
        })
    }

    /// Oldest membership first; equal `joined_at` falls back to the lower
    /// organization id
    async fn memberships_in_order(&self, user_id: Uuid) -> Result<Vec<Membership>, TenantError> {
        let mut memberships = self.store.list_memberships_for_user(user_id).await?;
        memberships.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.organization_id.cmp(&b.organization_id))
        });
        Ok(memberships)
    }

    async fn active_organization(&self, id: Uuid) -> Result<Option<Organization>, TenantError> {
        Ok(self
            .store
            .find_organization(id)
            .await?
            .filter(Organization::is_active))
    }
}
