use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::principal::AdminRole;

/// Dashboard end user (customer side)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Platform staff account. Backs both admin portal and GWI portal sessions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdminAccount {
    pub id: Uuid,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: AdminRole,
    /// Explicit allow-list, may contain namespace wildcards such as `gwi:*`
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
