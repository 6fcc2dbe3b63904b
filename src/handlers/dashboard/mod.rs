// handlers/dashboard/mod.rs - customer dashboard (`sessionToken`)
//
// session.rs       → GET /api/me, POST /api/auth/logout, PUT /api/preferences/locale
// organizations.rs → GET /api/organizations, GET|PUT /api/organizations/current,
//                    GET /api/organizations/current/features/:key
// members.rs       → GET /api/organizations/current/members,
//                    PATCH|DELETE /api/organizations/current/members/:user_id
// audit.rs         → GET /api/organizations/current/audit

pub mod audit;
pub mod members;
pub mod organizations;
pub mod session;

pub use audit::audit_list;
pub use members::{member_remove, member_update, members_list};
pub use organizations::{feature_get, organization_current, organization_switch, organizations_list};
pub use session::{locale_set, logout, me};

use crate::auth::{EndUser, Principal};
use crate::error::ApiError;

fn end_user(principal: &Principal) -> Result<&EndUser, ApiError> {
    principal
        .as_end_user()
        .ok_or_else(|| ApiError::forbidden("Dashboard routes require an end-user session"))
}
