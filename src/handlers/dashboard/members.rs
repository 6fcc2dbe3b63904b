use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::AuditEvent;
use crate::auth::OrgRole;
use crate::database::models::Membership;
use crate::database::{MemberChange, MembershipStore};
use crate::error::ApiError;
use crate::handlers::{parse_id, require_member_capability};
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenant::TenantContext;
use crate::types::Portal;

/// GET /api/organizations/current/members
pub async fn members_list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<Vec<Membership>> {
    require_member_capability(&tenant, "members:read")?;
    let members = state.store.list_members(tenant.organization.id).await?;
    Ok(ApiResponse::success(members))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: String,
}

/// PATCH /api/organizations/current/members/:user_id - change a member's role
pub async fn member_update(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateMemberRequest>,
) -> ApiResult<Membership> {
    require_member_capability(&tenant, "members:update")?;
    let user_id = parse_id("user_id", &user_id)?;
    let role: OrgRole = body
        .role
        .parse()
        .map_err(|e: crate::types::ParseEnumError| ApiError::invalid_field("role", e.to_string()))?;

    let organization_id = tenant.organization.id;
    let target = find_member(&state, organization_id, user_id).await?;
    if target.role == role {
        return Ok(ApiResponse::success(target));
    }

    // Granting or taking away ownership is an owner-only move
    if role == OrgRole::Owner || target.role == OrgRole::Owner {
        require_member_capability(&tenant, "ownership:transfer")?;
    }

    let updated = applied(state.store.update_member_role(organization_id, user_id, role).await?)?;

    state
        .audit()
        .record(
            AuditEvent::new(Portal::Dashboard, tenant.membership.user_id, "member.role_changed", "membership")
                .organization(organization_id)
                .resource(user_id.to_string())
                .details(json!({ "from": target.role, "to": role })),
        )
        .await?;

    Ok(ApiResponse::success(updated))
}

/// DELETE /api/organizations/current/members/:user_id
pub async fn member_remove(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(user_id): Path<String>,
) -> ApiResult<()> {
    require_member_capability(&tenant, "members:remove")?;
    let user_id = parse_id("user_id", &user_id)?;

    let organization_id = tenant.organization.id;
    let target = find_member(&state, organization_id, user_id).await?;
    if target.role == OrgRole::Owner {
        require_member_capability(&tenant, "ownership:transfer")?;
    }

    let removed = applied(state.store.remove_member(organization_id, user_id).await?)?;

    state
        .audit()
        .record(
            AuditEvent::new(Portal::Dashboard, tenant.membership.user_id, "member.removed", "membership")
                .organization(organization_id)
                .resource(user_id.to_string())
                .details(json!({ "role": removed.role })),
        )
        .await?;

    Ok(ApiResponse::<()>::no_content())
}

async fn find_member(state: &AppState, organization_id: Uuid, user_id: Uuid) -> Result<Membership, ApiError> {
    state
        .store
        .find_membership(user_id, organization_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member not found"))
}

/// Map a guarded membership write onto the response
fn applied(change: MemberChange) -> Result<Membership, ApiError> {
    match change {
        MemberChange::Applied(membership) => Ok(membership),
        MemberChange::NotFound => Err(ApiError::not_found("Member not found")),
        MemberChange::LastOwner => Err(ApiError::conflict("Organization must keep at least one owner")),
    }
}
