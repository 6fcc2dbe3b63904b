use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::principal::OrgRole;

/// Grants a user a role within exactly one organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    #[sqlx(try_from = "String")]
    pub role: OrgRole,
    pub joined_at: DateTime<Utc>,
}
