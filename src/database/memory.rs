//! In-process store used by the test suites and by development servers
//! started without DATABASE_URL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    AdminAccount, AuditLogEntry, FeatureFlag, FeatureOverride, Membership, Organization,
    PlanFeature, PlanTier, SessionRecord, UserAccount,
};
use super::store::{
    AuditQuery, AuditStore, FeatureStore, MemberChange, MembershipStore, OrganizationStore,
    PrincipalStore, SessionStore,
};
use crate::auth::principal::OrgRole;
use crate::types::Portal;

#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<(Portal, String), SessionRecord>>,
    users: RwLock<HashMap<Uuid, UserAccount>>,
    admins: RwLock<HashMap<Uuid, AdminAccount>>,
    organizations: RwLock<BTreeMap<Uuid, Organization>>,
    memberships: RwLock<BTreeMap<(Uuid, Uuid), Membership>>,
    flags: RwLock<BTreeMap<String, FeatureFlag>>,
    plan_features: RwLock<HashMap<(PlanTier, String), PlanFeature>>,
    overrides: RwLock<HashMap<(Uuid, String), FeatureOverride>>,
    audit: RwLock<Vec<AuditLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: UserAccount) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn insert_admin(&self, admin: AdminAccount) {
        self.admins.write().await.insert(admin.id, admin);
    }

    pub async fn insert_organization(&self, organization: Organization) {
        self.organizations
            .write()
            .await
            .insert(organization.id, organization);
    }

    pub async fn insert_membership(&self, membership: Membership) {
        self.memberships
            .write()
            .await
            .insert((membership.user_id, membership.organization_id), membership);
    }

    /// Flip the active bit on a user; returns false if the user is unknown
    pub async fn set_user_active(&self, id: Uuid, active: bool) -> bool {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.is_active = active;
                true
            }
            None => false,
        }
    }

    /// Flip the active bit on an admin; returns false if the admin is unknown
    pub async fn set_admin_active(&self, id: Uuid, active: bool) -> bool {
        match self.admins.write().await.get_mut(&id) {
            Some(admin) => {
                admin.is_active = active;
                true
            }
            None => false,
        }
    }

    pub async fn set_admin_permissions(&self, id: Uuid, permissions: Vec<String>) -> bool {
        match self.admins.write().await.get_mut(&id) {
            Some(admin) => {
                admin.permissions = permissions;
                true
            }
            None => false,
        }
    }

    pub async fn archive_organization(&self, id: Uuid, at: DateTime<Utc>) -> bool {
        match self.organizations.write().await.get_mut(&id) {
            Some(org) => {
                org.archived_at = Some(at);
                true
            }
            None => false,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: &SessionRecord) -> Result<(), DatabaseError> {
        let key = (session.portal, session.token_hash.clone());
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&key) {
            return Err(DatabaseError::QueryError("duplicate session token".to_string()));
        }
        sessions.insert(key, session.clone());
        Ok(())
    }

    async fn find_session(
        &self,
        portal: Portal,
        token_hash: &str,
    ) -> Result<Option<SessionRecord>, DatabaseError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(&(portal, token_hash.to_string()))
            .cloned())
    }

    async fn extend_session(
        &self,
        session_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions
            .values_mut()
            .find(|s| s.id == session_id && s.revoked_at.is_none())
        {
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete_session(&self, portal: Portal, token_hash: &str) -> Result<bool, DatabaseError> {
        Ok(self
            .sessions
            .write()
            .await
            .remove(&(portal, token_hash.to_string()))
            .is_some())
    }

    async fn revoke_sessions_for_principal(
        &self,
        principal_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let mut count = 0;
        for session in self.sessions.write().await.values_mut() {
            if session.principal_id == principal_id && session.revoked_at.is_none() {
                session.revoked_at = Some(at);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now) && s.revoked_at.is_none());
        Ok((before - sessions.len()) as u64)
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserAccount>, DatabaseError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_admin(&self, id: Uuid) -> Result<Option<AdminAccount>, DatabaseError> {
        Ok(self.admins.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl OrganizationStore for MemoryStore {
    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError> {
        Ok(self.organizations.read().await.get(&id).cloned())
    }

    async fn list_organizations(&self, limit: i64, offset: i64) -> Result<Vec<Organization>, DatabaseError> {
        let mut orgs: Vec<Organization> = self
            .organizations
            .read()
            .await
            .values()
            .filter(|o| o.is_active())
            .cloned()
            .collect();
        orgs.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(orgs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update_plan_tier(
        &self,
        id: Uuid,
        plan_tier: PlanTier,
    ) -> Result<Option<Organization>, DatabaseError> {
        let mut orgs = self.organizations.write().await;
        Ok(orgs.get_mut(&id).filter(|o| o.is_active()).map(|org| {
            org.plan_tier = plan_tier;
            org.updated_at = Utc::now();
            org.clone()
        }))
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, DatabaseError> {
        Ok(self
            .memberships
            .read()
            .await
            .get(&(user_id, organization_id))
            .cloned())
    }

    async fn list_memberships_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, DatabaseError> {
        let mut rows: Vec<Membership> = self
            .memberships
            .read()
            .await
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.organization_id.cmp(&b.organization_id))
        });
        Ok(rows)
    }

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Membership>, DatabaseError> {
        let mut rows: Vec<Membership> = self
            .memberships
            .read()
            .await
            .values()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(rows)
    }

    async fn update_member_role(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<MemberChange, DatabaseError> {
        let mut memberships = self.memberships.write().await;
        let Some(current) = memberships.get(&(user_id, organization_id)) else {
            return Ok(MemberChange::NotFound);
        };
        if current.role == OrgRole::Owner
            && role != OrgRole::Owner
            && owner_count(&memberships, organization_id) <= 1
        {
            return Ok(MemberChange::LastOwner);
        }
        Ok(match memberships.get_mut(&(user_id, organization_id)) {
            Some(membership) => {
                membership.role = role;
                MemberChange::Applied(membership.clone())
            }
            None => MemberChange::NotFound,
        })
    }

    async fn remove_member(&self, organization_id: Uuid, user_id: Uuid) -> Result<MemberChange, DatabaseError> {
        let mut memberships = self.memberships.write().await;
        let Some(current) = memberships.get(&(user_id, organization_id)) else {
            return Ok(MemberChange::NotFound);
        };
        if current.role == OrgRole::Owner && owner_count(&memberships, organization_id) <= 1 {
            return Ok(MemberChange::LastOwner);
        }
        Ok(memberships
            .remove(&(user_id, organization_id))
            .map_or(MemberChange::NotFound, MemberChange::Applied))
    }
}

fn owner_count(memberships: &BTreeMap<(Uuid, Uuid), Membership>, organization_id: Uuid) -> usize {
    memberships
        .values()
        .filter(|m| m.organization_id == organization_id && m.role == OrgRole::Owner)
        .count()
}

#[async_trait]
impl FeatureStore for MemoryStore {
    async fn find_flag(&self, key: &str) -> Result<Option<FeatureFlag>, DatabaseError> {
        Ok(self.flags.read().await.get(key).cloned())
    }

    async fn list_flags(&self) -> Result<Vec<FeatureFlag>, DatabaseError> {
        Ok(self.flags.read().await.values().cloned().collect())
    }

    async fn find_plan_feature(
        &self,
        plan_tier: PlanTier,
        key: &str,
    ) -> Result<Option<PlanFeature>, DatabaseError> {
        Ok(self
            .plan_features
            .read()
            .await
            .get(&(plan_tier, key.to_string()))
            .cloned())
    }

    async fn find_override(
        &self,
        organization_id: Uuid,
        key: &str,
    ) -> Result<Option<FeatureOverride>, DatabaseError> {
        Ok(self
            .overrides
            .read()
            .await
            .get(&(organization_id, key.to_string()))
            .cloned())
    }

    async fn upsert_flag(&self, flag: &FeatureFlag) -> Result<(), DatabaseError> {
        self.flags
            .write()
            .await
            .insert(flag.key.clone(), flag.clone());
        Ok(())
    }

    async fn upsert_plan_feature(&self, plan_feature: &PlanFeature) -> Result<(), DatabaseError> {
        self.plan_features.write().await.insert(
            (plan_feature.plan_tier, plan_feature.feature_key.clone()),
            plan_feature.clone(),
        );
        Ok(())
    }

    async fn upsert_override(&self, feature_override: &FeatureOverride) -> Result<(), DatabaseError> {
        self.overrides.write().await.insert(
            (
                feature_override.organization_id,
                feature_override.feature_key.clone(),
            ),
            feature_override.clone(),
        );
        Ok(())
    }

    async fn delete_override(&self, organization_id: Uuid, key: &str) -> Result<bool, DatabaseError> {
        Ok(self
            .overrides
            .write()
            .await
            .remove(&(organization_id, key.to_string()))
            .is_some())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), DatabaseError> {
        self.audit.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, DatabaseError> {
        let audit = self.audit.read().await;
        // Appended in time order, so newest first is a reverse walk
        Ok(audit
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .take(query.clamped_limit() as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrincipalKind;
    use chrono::Duration;

    fn session(portal: Portal, hash: &str, expires_at: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            token_hash: hash.to_string(),
            portal,
            principal_id: Uuid::new_v4(),
            principal_kind: portal.principal_kind(),
            created_at: Utc::now(),
            expires_at,
            revoked_at: None,
        }
    }

    #[tokio::test]
    async fn sessions_are_namespaced_by_portal() {
        let store = MemoryStore::new();
        let later = Utc::now() + Duration::hours(1);
        store
            .insert_session(&session(Portal::Admin, "abc", later))
            .await
            .unwrap();

        assert!(store.find_session(Portal::Admin, "abc").await.unwrap().is_some());
        assert!(store.find_session(Portal::Gwi, "abc").await.unwrap().is_none());
        assert_eq!(
            store
                .find_session(Portal::Admin, "abc")
                .await
                .unwrap()
                .map(|s| s.principal_kind),
            Some(PrincipalKind::Admin)
        );
    }

    #[tokio::test]
    async fn sweep_only_removes_expired_sessions() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_session(&session(Portal::Dashboard, "old", now - Duration::minutes(1)))
            .await
            .unwrap();
        store
            .insert_session(&session(Portal::Dashboard, "new", now + Duration::minutes(1)))
            .await
            .unwrap();

        assert_eq!(store.delete_expired_sessions(now).await.unwrap(), 1);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn revoked_sessions_are_kept_until_swept() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let banned = session(Portal::Dashboard, "banned", now + Duration::hours(1));
        store.insert_session(&banned).await.unwrap();
        store
            .insert_session(&session(Portal::Dashboard, "other", now + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(store.revoke_sessions_for_principal(banned.principal_id, now).await.unwrap(), 1);
        // Already revoked sessions are not counted twice
        assert_eq!(store.revoke_sessions_for_principal(banned.principal_id, now).await.unwrap(), 0);
        let stored = store.find_session(Portal::Dashboard, "banned").await.unwrap().unwrap();
        assert_eq!(stored.revoked_at, Some(now));

        assert_eq!(store.delete_expired_sessions(now).await.unwrap(), 1);
        assert!(store.find_session(Portal::Dashboard, "other").await.unwrap().is_some());
    }

    fn membership(organization_id: Uuid, role: OrgRole) -> Membership {
        Membership {
            user_id: Uuid::new_v4(),
            organization_id,
            role,
            joined_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn concurrent_owner_demotions_keep_one_owner() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        let first = membership(org, OrgRole::Owner);
        let second = membership(org, OrgRole::Owner);
        store.insert_membership(first.clone()).await;
        store.insert_membership(second.clone()).await;

        let (a, b) = tokio::join!(
            store.update_member_role(org, first.user_id, OrgRole::Admin),
            store.remove_member(org, second.user_id),
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(
            outcomes.iter().filter(|o| matches!(o, MemberChange::Applied(_))).count(),
            1
        );
        assert!(outcomes.contains(&MemberChange::LastOwner));

        let owners = store
            .list_members(org)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.role == OrgRole::Owner)
            .count();
        assert_eq!(owners, 1);
    }

    #[tokio::test]
    async fn guarded_writes_report_missing_members() {
        let store = MemoryStore::new();
        let org = Uuid::new_v4();
        assert_eq!(
            store.update_member_role(org, Uuid::new_v4(), OrgRole::Admin).await.unwrap(),
            MemberChange::NotFound
        );
        assert_eq!(
            store.remove_member(org, Uuid::new_v4()).await.unwrap(),
            MemberChange::NotFound
        );

        let only = membership(org, OrgRole::Owner);
        store.insert_membership(only.clone()).await;
        // Re-asserting ownership is not a demotion
        assert!(matches!(
            store.update_member_role(org, only.user_id, OrgRole::Owner).await.unwrap(),
            MemberChange::Applied(_)
        ));
    }
}
