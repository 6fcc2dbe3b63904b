//! Storage seams for the authorization core.
//!
//! Every resolver is generic over the narrowest trait it needs, so tests can
//! run against [`crate::database::MemoryStore`] and the server against
//! [`crate::database::PgStore`] without any code change in between.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    AdminAccount, AuditLogEntry, FeatureFlag, FeatureOverride, Membership, Organization,
    PlanFeature, PlanTier, SessionRecord, UserAccount,
};
use crate::auth::principal::OrgRole;
use crate::types::Portal;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &SessionRecord) -> Result<(), DatabaseError>;

    /// Exact lookup by token hash, scoped to one portal
    async fn find_session(
        &self,
        portal: Portal,
        token_hash: &str,
    ) -> Result<Option<SessionRecord>, DatabaseError>;

    async fn extend_session(
        &self,
        session_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Returns whether a session was removed
    async fn delete_session(&self, portal: Portal, token_hash: &str) -> Result<bool, DatabaseError>;

    /// Stamp `revoked_at` on every live session of a principal
    async fn revoke_sessions_for_principal(
        &self,
        principal_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;

    /// Delete expired and revoked sessions
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError>;
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserAccount>, DatabaseError>;

    async fn find_admin(&self, id: Uuid) -> Result<Option<AdminAccount>, DatabaseError>;
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError>;

    /// Active organizations ordered by slug
    async fn list_organizations(&self, limit: i64, offset: i64) -> Result<Vec<Organization>, DatabaseError>;

    async fn update_plan_tier(
        &self,
        id: Uuid,
        plan_tier: PlanTier,
    ) -> Result<Option<Organization>, DatabaseError>;
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, DatabaseError>;

    /// All memberships of a user, ordered by `joined_at` then organization id
    async fn list_memberships_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, DatabaseError>;

    /// All members of an organization, ordered by `joined_at` then user id
    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Membership>, DatabaseError>;

    /// Change a member's role. Refuses to demote the organization's only
    /// owner; the owner count and the write happen as one step.
    async fn update_member_role(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<MemberChange, DatabaseError>;

    /// Remove a member, returning the removed row. Refuses to remove the
    /// organization's only owner.
    async fn remove_member(&self, organization_id: Uuid, user_id: Uuid) -> Result<MemberChange, DatabaseError>;
}

/// Outcome of a membership write guarded by the last-owner rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberChange {
    Applied(Membership),
    NotFound,
    LastOwner,
}

#[async_trait]
pub trait FeatureStore: Send + Sync {
    async fn find_flag(&self, key: &str) -> Result<Option<FeatureFlag>, DatabaseError>;

    async fn list_flags(&self) -> Result<Vec<FeatureFlag>, DatabaseError>;

    async fn find_plan_feature(
        &self,
        plan_tier: PlanTier,
        key: &str,
    ) -> Result<Option<PlanFeature>, DatabaseError>;

    async fn find_override(
        &self,
        organization_id: Uuid,
        key: &str,
    ) -> Result<Option<FeatureOverride>, DatabaseError>;

    async fn upsert_flag(&self, flag: &FeatureFlag) -> Result<(), DatabaseError>;

    async fn upsert_plan_feature(&self, plan_feature: &PlanFeature) -> Result<(), DatabaseError>;

    async fn upsert_override(&self, feature_override: &FeatureOverride) -> Result<(), DatabaseError>;

    async fn delete_override(&self, organization_id: Uuid, key: &str) -> Result<bool, DatabaseError>;
}

/// Filter for reading the audit trail. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub portal: Option<Portal>,
    pub organization_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub limit: i64,
}

impl AuditQuery {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 500;

    pub fn clamped_limit(&self) -> i64 {
        if self.limit <= 0 {
            Self::DEFAULT_LIMIT
        } else {
            self.limit.min(Self::MAX_LIMIT)
        }
    }

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.portal.map_or(true, |p| entry.portal == p)
            && self
                .organization_id
                .map_or(true, |id| entry.organization_id == Some(id))
            && self.actor_id.map_or(true, |id| entry.actor_id == id)
    }
}

/// Audit entries are append-only: no update, no delete.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), DatabaseError>;

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, DatabaseError>;
}

/// Everything the HTTP layer needs from one backing store
pub trait Store:
    SessionStore + PrincipalStore + OrganizationStore + MembershipStore + FeatureStore + AuditStore
{
}

impl<T> Store for T where
    T: SessionStore
        + PrincipalStore
        + OrganizationStore
        + MembershipStore
        + FeatureStore
        + AuditStore
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_limit_is_clamped() {
        let mut query = AuditQuery::default();
        assert_eq!(query.clamped_limit(), AuditQuery::DEFAULT_LIMIT);
        query.limit = 10_000;
        assert_eq!(query.clamped_limit(), AuditQuery::MAX_LIMIT);
        query.limit = 7;
        assert_eq!(query.clamped_limit(), 7);
    }
}
