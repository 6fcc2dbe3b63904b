// handlers/admin/mod.rs - platform admin portal (`adminToken`)
//
// Every handler checks a `super:*` capability against the admin's role and
// explicit permissions as loaded for this request.

pub mod audit;
pub mod features;
pub mod organizations;
pub mod session;

pub use audit::audit_list;
pub use features::{feature_get, feature_override_clear, feature_override_set};
pub use organizations::{organization_update, organizations_list};
pub use session::{logout, me};

use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Organization;
use crate::database::OrganizationStore;
use crate::error::ApiError;

/// Archived organizations stay visible to staff
async fn load_organization(state: &AppState, id: Uuid) -> Result<Organization, ApiError> {
    state
        .store
        .find_organization(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization not found"))
}
