use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{Portal, PrincipalKind};

/// Stored session. Only the SHA-256 of the bearer token is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub token_hash: String,
    #[sqlx(try_from = "String")]
    pub portal: Portal,
    pub principal_id: Uuid,
    #[sqlx(try_from = "String")]
    pub principal_kind: PrincipalKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
