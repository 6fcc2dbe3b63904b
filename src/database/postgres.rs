use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::manager::{DatabaseError, DatabaseManager};
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

const SESSION_COLUMNS: &str =
    "id, token_hash, portal, principal_id, principal_kind, created_at, expires_at, revoked_at";
const ORGANIZATION_COLUMNS: &str =
    "id, slug, name, plan_tier, parent_id, settings, created_at, updated_at, archived_at";
const MEMBERSHIP_COLUMNS: &str = "user_id, organization_id, role, joined_at";
const FLAG_COLUMNS: &str =
    "key, description, is_enabled_by_default, rollout_percentage, default_limit, updated_at";
const OVERRIDE_COLUMNS: &str =
    "organization_id, feature_key, enabled, limit_value, limit_unbounded, updated_by, updated_at";
const AUDIT_COLUMNS: &str =
    "id, portal, actor_id, organization_id, action, resource_type, resource_id, details, created_at";

/// Postgres-backed implementation of every store trait
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(&self, session: &SessionRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, token_hash, portal, principal_id, principal_kind, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id)
        .bind(&session.token_hash)
        .bind(session.portal.as_str())
        .bind(session.principal_id)
        .bind(session.principal_kind.as_str())
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(
        &self,
        portal: Portal,
        token_hash: &str,
    ) -> Result<Option<SessionRecord>, DatabaseError> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE portal = $1 AND token_hash = $2"
        );
        let row = sqlx::query_as::<_, SessionRecord>(&query)
            .bind(portal.as_str())
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn extend_session(
        &self,
        session_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE sessions SET expires_at = $2 WHERE id = $1 AND revoked_at IS NULL")
            .bind(session_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_session(&self, portal: Portal, token_hash: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM sessions WHERE portal = $1 AND token_hash = $2")
            .bind(portal.as_str())
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_sessions_for_principal(
        &self,
        principal_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = $2 WHERE principal_id = $1 AND revoked_at IS NULL",
        )
        .bind(principal_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1 OR revoked_at IS NOT NULL")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PrincipalStore for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserAccount>, DatabaseError> {
        let row = sqlx::query_as::<_, UserAccount>(
            "SELECT id, email, name, is_active, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_admin(&self, id: Uuid) -> Result<Option<AdminAccount>, DatabaseError> {
        let row = sqlx::query_as::<_, AdminAccount>(
            "SELECT id, email, role, permissions, is_active, created_at FROM super_admins WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl OrganizationStore for PgStore {
    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError> {
        let query = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1");
        let row = sqlx::query_as::<_, Organization>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_organizations(&self, limit: i64, offset: i64) -> Result<Vec<Organization>, DatabaseError> {
        let query = format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations
             WHERE archived_at IS NULL
             ORDER BY slug ASC
             LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, Organization>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update_plan_tier(
        &self,
        id: Uuid,
        plan_tier: PlanTier,
    ) -> Result<Option<Organization>, DatabaseError> {
        let query = format!(
            "UPDATE organizations SET plan_tier = $2, updated_at = now()
             WHERE id = $1 AND archived_at IS NULL
             RETURNING {ORGANIZATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Organization>(&query)
            .bind(id)
            .bind(plan_tier.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, DatabaseError> {
        let query = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = $1 AND organization_id = $2"
        );
        let row = sqlx::query_as::<_, Membership>(&query)
            .bind(user_id)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_memberships_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, DatabaseError> {
        let query = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships
             WHERE user_id = $1
             ORDER BY joined_at ASC, organization_id ASC"
        );
        let rows = sqlx::query_as::<_, Membership>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Membership>, DatabaseError> {
        let query = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships
             WHERE organization_id = $1
             ORDER BY joined_at ASC, user_id ASC"
        );
        let rows = sqlx::query_as::<_, Membership>(&query)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update_member_role(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<MemberChange, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let Some(current) = lock_membership(&mut tx, organization_id, user_id).await? else {
            return Ok(MemberChange::NotFound);
        };
        if current.role == OrgRole::Owner
            && role != OrgRole::Owner
            && count_owners(&mut tx, organization_id).await? <= 1
        {
            return Ok(MemberChange::LastOwner);
        }

        let query = format!(
            "UPDATE memberships SET role = $3
             WHERE organization_id = $1 AND user_id = $2
             RETURNING {MEMBERSHIP_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Membership>(&query)
            .bind(organization_id)
            .bind(user_id)
            .bind(role.as_str())
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(MemberChange::Applied(updated))
    }

    async fn remove_member(&self, organization_id: Uuid, user_id: Uuid) -> Result<MemberChange, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let Some(current) = lock_membership(&mut tx, organization_id, user_id).await? else {
            return Ok(MemberChange::NotFound);
        };
        if current.role == OrgRole::Owner && count_owners(&mut tx, organization_id).await? <= 1 {
            return Ok(MemberChange::LastOwner);
        }

        sqlx::query("DELETE FROM memberships WHERE organization_id = $1 AND user_id = $2")
            .bind(organization_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(MemberChange::Applied(current))
    }
}

/// Takes the organization row lock first, so concurrent membership writes
/// for one organization are serialized, then reads the target membership.
async fn lock_membership(
    tx: &mut Transaction<'_, Postgres>,
    organization_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Membership>, DatabaseError> {
    sqlx::query("SELECT id FROM organizations WHERE id = $1 FOR UPDATE")
        .bind(organization_id)
        .execute(&mut **tx)
        .await?;
    let query = format!(
        "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE organization_id = $1 AND user_id = $2"
    );
    let row = sqlx::query_as::<_, Membership>(&query)
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row)
}

async fn count_owners(
    tx: &mut Transaction<'_, Postgres>,
    organization_id: Uuid,
) -> Result<i64, DatabaseError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM memberships WHERE organization_id = $1 AND role = 'OWNER'",
    )
    .bind(organization_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count)
}

#[async_trait]
impl FeatureStore for PgStore {
    async fn find_flag(&self, key: &str) -> Result<Option<FeatureFlag>, DatabaseError> {
        let query = format!("SELECT {FLAG_COLUMNS} FROM feature_flags WHERE key = $1");
        let row = sqlx::query_as::<_, FeatureFlag>(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_flags(&self) -> Result<Vec<FeatureFlag>, DatabaseError> {
        let query = format!("SELECT {FLAG_COLUMNS} FROM feature_flags ORDER BY key ASC");
        let rows = sqlx::query_as::<_, FeatureFlag>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_plan_feature(
        &self,
        plan_tier: PlanTier,
        key: &str,
    ) -> Result<Option<PlanFeature>, DatabaseError> {
        let row = sqlx::query_as::<_, PlanFeature>(
            "SELECT plan_tier, feature_key, enabled, limit_value, limit_unbounded
             FROM plan_features WHERE plan_tier = $1 AND feature_key = $2",
        )
        .bind(plan_tier.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_override(
        &self,
        organization_id: Uuid,
        key: &str,
    ) -> Result<Option<FeatureOverride>, DatabaseError> {
        let query = format!(
            "SELECT {OVERRIDE_COLUMNS} FROM organization_feature_overrides
             WHERE organization_id = $1 AND feature_key = $2"
        );
        let row = sqlx::query_as::<_, FeatureOverride>(&query)
            .bind(organization_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn upsert_flag(&self, flag: &FeatureFlag) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO feature_flags (key, description, is_enabled_by_default, rollout_percentage, default_limit, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (key) DO UPDATE SET
                description = EXCLUDED.description,
                is_enabled_by_default = EXCLUDED.is_enabled_by_default,
                rollout_percentage = EXCLUDED.rollout_percentage,
                default_limit = EXCLUDED.default_limit,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&flag.key)
        .bind(&flag.description)
        .bind(flag.is_enabled_by_default)
        .bind(flag.rollout_percentage)
        .bind(flag.default_limit)
        .bind(flag.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_plan_feature(&self, plan_feature: &PlanFeature) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO plan_features (plan_tier, feature_key, enabled, limit_value, limit_unbounded)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (plan_tier, feature_key) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                limit_value = EXCLUDED.limit_value,
                limit_unbounded = EXCLUDED.limit_unbounded
            "#,
        )
        .bind(plan_feature.plan_tier.as_str())
        .bind(&plan_feature.feature_key)
        .bind(plan_feature.enabled)
        .bind(plan_feature.limit_value)
        .bind(plan_feature.limit_unbounded)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_override(&self, feature_override: &FeatureOverride) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO organization_feature_overrides
                (organization_id, feature_key, enabled, limit_value, limit_unbounded, updated_by, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (organization_id, feature_key) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                limit_value = EXCLUDED.limit_value,
                limit_unbounded = EXCLUDED.limit_unbounded,
                updated_by = EXCLUDED.updated_by,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(feature_override.organization_id)
        .bind(&feature_override.feature_key)
        .bind(feature_override.enabled)
        .bind(feature_override.limit_value)
        .bind(feature_override.limit_unbounded)
        .bind(feature_override.updated_by)
        .bind(feature_override.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_override(&self, organization_id: Uuid, key: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "DELETE FROM organization_feature_overrides WHERE organization_id = $1 AND feature_key = $2",
        )
        .bind(organization_id)
        .bind(key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, portal, actor_id, organization_id, action, resource_type, resource_id, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.portal.as_str())
        .bind(entry.actor_id)
        .bind(entry.organization_id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, DatabaseError> {
        // NULL parameters disable the corresponding filter
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log
             WHERE ($1::text IS NULL OR portal = $1)
               AND ($2::uuid IS NULL OR organization_id = $2)
               AND ($3::uuid IS NULL OR actor_id = $3)
             ORDER BY created_at DESC, id DESC
             LIMIT $4"
        );
        let rows = sqlx::query_as::<_, AuditLogEntry>(&sql)
            .bind(query.portal.map(|p| p.as_str()))
            .bind(query.organization_id)
            .bind(query.actor_id)
            .bind(query.clamped_limit())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
